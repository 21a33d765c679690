use clap::Parser;
use plotters::prelude::*;
use std::fs::{self, File};
use std::path::PathBuf;
use world_transfer::config::load_world;
use world_transfer::export::trajectory::read_trajectory;
use world_transfer::trajopt::world;
use world_transfer::{World, constants};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Render a transfer trajectory CSV with both worlds and the target orbit"
)]
struct Cli {
    #[arg(long)]
    input: PathBuf,
    #[arg(long, default_value = "artifacts/transfer.png")]
    output: PathBuf,
    /// World definition (defaults to the standard two-world system)
    #[arg(long)]
    world: Option<PathBuf>,
    #[arg(long, default_value_t = constants::TARGET_ORBIT_RADIUS)]
    orbit_radius: f64,
    #[arg(long, default_value_t = 1000)]
    width: u32,
    #[arg(long, default_value_t = 700)]
    height: u32,
    /// Skip captions and axis labels (no system fonts needed)
    #[arg(long, default_value_t = false)]
    no_labels: bool,
}

fn main() -> anyhow::Result<()> {
    world_transfer::init_tracing();
    let cli = Cli::parse();
    let world = match &cli.world {
        Some(path) => world::from_config(&load_world(path)?)?,
        None => World::standard(),
    };
    let trajectory = read_trajectory(File::open(&cli.input)?)?;
    let path: Vec<(f64, f64)> = trajectory.states().iter().map(|x| (x[0], x[1])).collect();

    let (x_range, y_range) = plot_bounds(&path, &world, cli.orbit_radius, cli.width, cli.height);

    if let Some(parent) = cli.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let output_str = cli
        .output
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Output path contains invalid UTF-8"))?;
    let root = BitMapBackend::new(output_str, (cli.width, cli.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if !cli.no_labels {
        let font_family = select_font_family();
        builder
            .caption(
                format!(
                    "Transfer: T = {:.3}, {} knots",
                    trajectory.duration(),
                    trajectory.len()
                ),
                FontDesc::new(font_family, 24.0, FontStyle::Bold),
            )
            .x_label_area_size(40)
            .y_label_area_size(50);
    }
    let mut chart = builder.build_cartesian_2d(x_range, y_range)?;
    if !cli.no_labels {
        let label_font = FontDesc::new(select_font_family(), 16.0, FontStyle::Normal);
        chart
            .configure_mesh()
            .x_desc("x")
            .y_desc("y")
            .label_style(label_font)
            .draw()?;
    }

    let destination = world.destination.position;
    let orbit: Vec<(f64, f64)> = (0..=180)
        .map(|i| {
            let angle = i as f64 / 180.0 * std::f64::consts::TAU;
            (
                destination.x + cli.orbit_radius * angle.cos(),
                destination.y + cli.orbit_radius * angle.sin(),
            )
        })
        .collect();
    chart.draw_series(std::iter::once(PathElement::new(
        orbit,
        ShapeStyle::from(&BLACK.mix(0.4)).stroke_width(1),
    )))?;

    let body_colors = [RGBColor(40, 90, 200), RGBColor(200, 120, 30)];
    for (body, color) in world.bodies().iter().zip(body_colors) {
        chart.draw_series(std::iter::once(Circle::new(
            (body.position.x, body.position.y),
            8,
            color.filled(),
        )))?;
        if !cli.no_labels {
            chart.draw_series(std::iter::once(Text::new(
                body.name.clone(),
                (body.position.x, body.position.y - 0.25),
                FontDesc::new(select_font_family(), 16.0, FontStyle::Normal).color(&color),
            )))?;
        }
    }

    let path_color = RGBColor(210, 40, 60);
    chart.draw_series(std::iter::once(PathElement::new(
        path.clone(),
        ShapeStyle::from(&path_color).stroke_width(2),
    )))?;
    chart.draw_series(
        path.iter()
            .map(|&p| Circle::new(p, 2, path_color.filled())),
    )?;

    // thrust direction at every knot, scaled to the plot
    let span = (path_span(&path) / 40.0).max(1e-3);
    let peak = trajectory
        .controls()
        .iter()
        .map(|u| u.norm())
        .fold(0.0, f64::max);
    if peak > 0.0 {
        let thrust_color = RGBColor(30, 150, 80);
        for (p, u) in path.iter().zip(trajectory.controls()) {
            let scale = span / peak;
            chart.draw_series(std::iter::once(PathElement::new(
                vec![*p, (p.0 + u.x * scale, p.1 + u.y * scale)],
                ShapeStyle::from(&thrust_color).stroke_width(1),
            )))?;
        }
    }

    root.present()?;
    Ok(())
}

fn select_font_family() -> FontFamily<'static> {
    if cfg!(target_os = "macos") {
        FontFamily::Name("Helvetica")
    } else if cfg!(target_os = "windows") {
        FontFamily::Name("Arial")
    } else {
        FontFamily::Name("DejaVu Sans")
    }
}

/// Bounding box `(min_x, max_x, min_y, max_y)` of `points`.
fn bounding_box(points: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    points.iter().fold(
        (
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
        ),
        |(min_x, max_x, min_y, max_y), &(x, y)| {
            (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y))
        },
    )
}

fn path_span(path: &[(f64, f64)]) -> f64 {
    let (min_x, max_x, min_y, max_y) = bounding_box(path);
    (max_x - min_x).max(max_y - min_y).max(0.0)
}

/// Axis ranges covering the path, both bodies and the target orbit, with equal scale.
fn plot_bounds(
    path: &[(f64, f64)],
    world: &World,
    orbit_radius: f64,
    width: u32,
    height: u32,
) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    let d = world.destination.position;
    let mut points: Vec<(f64, f64)> = path.to_vec();
    points.extend(world.bodies().iter().map(|b| (b.position.x, b.position.y)));
    points.push((d.x - orbit_radius, d.y - orbit_radius));
    points.push((d.x + orbit_radius, d.y + orbit_radius));

    let (min_x, max_x, min_y, max_y) = bounding_box(&points);
    let pad = 0.1 * (max_x - min_x).max(max_y - min_y).max(1.0);
    let (cx, cy) = (0.5 * (min_x + max_x), 0.5 * (min_y + max_y));
    let aspect = width as f64 / height.max(1) as f64;
    let mut half_x = 0.5 * (max_x - min_x) + pad;
    let mut half_y = 0.5 * (max_y - min_y) + pad;
    if half_x / half_y < aspect {
        half_x = half_y * aspect;
    } else {
        half_y = half_x / aspect;
    }
    (cx - half_x..cx + half_x, cy - half_y..cy + half_y)
}
