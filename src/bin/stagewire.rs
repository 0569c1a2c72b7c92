use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use stagewire::{
    Affine, BitmapProps, FillMode, Filter, FrameCapture, GraphicsCommand, NodeId, NodeType, Rect,
    Runtime, RuntimeOpts, StageDisplayRule, Vec2, WireBuffer, WireCapture,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stagewire", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the built-in demo scene and write the last frame as a PNG.
    Demo(DemoArgs),
    /// Decode a wire capture and print its messages.
    Dump(DumpArgs),
}

#[derive(Parser, Debug)]
struct DemoArgs {
    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Frames to run.
    #[arg(long, default_value_t = 30)]
    frames: u32,

    /// Backing-store pixels per content unit.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Runtime options JSON.
    #[arg(long)]
    opts: Option<PathBuf>,

    /// Write the last synchronized wire buffer as JSON.
    #[arg(long)]
    capture: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct DumpArgs {
    /// Wire capture JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Print messages as JSON lines.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Demo(args) => cmd_demo(args),
        Command::Dump(args) => cmd_dump(args),
    }
}

fn read_opts(path: Option<&Path>) -> anyhow::Result<RuntimeOpts> {
    let Some(path) = path else {
        return Ok(RuntimeOpts::default());
    };
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read options '{}'", path.display()))?;
    RuntimeOpts::from_json_str(&s).with_context(|| "parse options JSON")
}

fn fill(color: u32, alpha: f32) -> GraphicsCommand {
    GraphicsCommand::BeginFill { color, alpha }
}

struct Demo {
    stage: NodeId,
    spinner: NodeId,
}

fn build_demo(rt: &mut Runtime, scale: f64) -> anyhow::Result<Demo> {
    let rule = StageDisplayRule {
        content_scale: scale,
        ..StageDisplayRule::fixed(320, 200)
    };
    let (stage, _) = rt.create_stage(rule);

    let mut checker = Vec::with_capacity(8 * 8 * 4);
    for y in 0..8u32 {
        for x in 0..8u32 {
            let on = (x / 2 + y / 2) % 2 == 0;
            checker.extend_from_slice(if on { &[230, 230, 240, 255] } else { &[90, 90, 120, 255] });
        }
    }
    rt.bridge_mut()
        .register_texture("checker", 8, 8, checker)
        .with_context(|| "register demo texture")?;

    let scene = rt.scene_mut();

    let backdrop = scene.create_node(NodeType::Graphics);
    scene.push_graphics(backdrop, fill(0x12141c, 1.0));
    scene.push_graphics(
        backdrop,
        GraphicsCommand::DrawRect {
            x: 0.0,
            y: 0.0,
            w: 320.0,
            h: 200.0,
        },
    );
    scene.add_child(stage, backdrop)?;

    let tiles = scene.create_node(NodeType::Bitmap);
    scene.update_bitmap(tiles, |b| {
        *b = BitmapProps {
            texture: Some("checker".into()),
            size: Some(Vec2::new(96.0, 64.0)),
            fill_mode: FillMode::Repeat,
            smoothing: false,
            scale9_grid: None,
        }
    });
    scene.set_matrix(tiles, Affine::translate((16.0, 16.0)));
    scene.add_child(stage, tiles)?;

    let panel = scene.create_node(NodeType::Bitmap);
    scene.update_bitmap(panel, |b| {
        *b = BitmapProps {
            texture: Some("checker".into()),
            size: Some(Vec2::new(120.0, 48.0)),
            fill_mode: FillMode::Scale,
            smoothing: true,
            scale9_grid: Some(Rect::new(2.0, 2.0, 6.0, 6.0)),
        }
    });
    scene.set_matrix(panel, Affine::translate((184.0, 16.0)));
    scene.add_child(stage, panel)?;

    let label = scene.create_node(NodeType::TextField);
    scene.update_text_field(label, |t| {
        t.text = "stagewire".into();
        t.background = true;
        t.background_color = 0x2a2f45;
        t.border = true;
        t.border_color = 0xf0c040;
        t.size = Vec2::new(120.0, 28.0);
    });
    scene.set_matrix(label, Affine::translate((184.0, 80.0)));
    scene.add_child(stage, label)?;

    let glow = scene.create_node(NodeType::Graphics);
    scene.push_graphics(glow, fill(0x40a0ff, 0.8));
    scene.push_graphics(
        glow,
        GraphicsCommand::DrawCircle {
            x: 60.0,
            y: 140.0,
            r: 28.0,
        },
    );
    scene.set_filters(
        glow,
        vec![Filter::Blur {
            blur_x: 4.0,
            blur_y: 4.0,
        }],
    );
    scene.add_child(stage, glow)?;

    let spinner = scene.create_node(NodeType::Node);
    let arm = scene.create_node(NodeType::Graphics);
    scene.push_graphics(arm, fill(0xf05050, 1.0));
    scene.push_graphics(
        arm,
        GraphicsCommand::DrawRect {
            x: -40.0,
            y: -6.0,
            w: 80.0,
            h: 12.0,
        },
    );
    scene.add_child(spinner, arm)?;
    let window = scene.create_node(NodeType::Graphics);
    scene.push_graphics(window, fill(0xffffff, 1.0));
    scene.push_graphics(
        window,
        GraphicsCommand::DrawCircle {
            x: 0.0,
            y: 0.0,
            r: 32.0,
        },
    );
    scene.set_mask(spinner, Some(window));
    scene.set_matrix(spinner, Affine::translate((240.0, 150.0)));
    scene.add_child(stage, spinner)?;

    Ok(Demo { stage, spinner })
}

fn cmd_demo(args: DemoArgs) -> anyhow::Result<()> {
    let opts = read_opts(args.opts.as_deref())?;
    let mut rt = Runtime::new(opts);
    let demo = build_demo(&mut rt, args.scale)?;

    let handle = rt
        .bridge()
        .registry()
        .handle_for(demo.stage)
        .context("demo stage has no handle")?;
    let capture = FrameCapture::new();
    rt.bridge_mut()
        .attach_screen(handle, Box::new(capture.clone()));

    for i in 0..args.frames {
        let angle = f64::from(i) * 0.1;
        rt.scene_mut().set_matrix(
            demo.spinner,
            Affine::translate((240.0, 150.0)) * Affine::rotate(angle),
        );
        rt.advance_frame(0.0)?;
    }
    let wire = rt.bridge().last_wire().to_capture();
    // One idle frame: nothing changed, so the stage is skipped.
    rt.advance_frame(0.0)?;

    let frame = capture
        .last_frame()
        .context("no frame was presented")?;
    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.to_straight_rgba(),
        frame.width(),
        frame.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    if let Some(path) = &args.capture {
        let json = wire.to_json_string()?;
        std::fs::write(path, json)
            .with_context(|| format!("write capture '{}'", path.display()))?;
    }

    let stats = rt.frame_stats();
    let pool = rt.bridge().pool_stats();
    eprintln!(
        "frames={} drawn={} skipped={} mean_render_ms={:.3} pool_retained={} pool_reused={}",
        stats.frames,
        stats.frames_drawn,
        stats.frames_skipped,
        stats.mean_render_ms(),
        pool.retained,
        pool.reused,
    );
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_dump(args: DumpArgs) -> anyhow::Result<()> {
    let s = std::fs::read_to_string(&args.in_path)
        .with_context(|| format!("read capture '{}'", args.in_path.display()))?;
    let capture = WireCapture::from_json_str(&s).with_context(|| "parse capture JSON")?;
    let buf = WireBuffer::from_capture(capture);
    let messages = stagewire::decode_all(&buf).with_context(|| "decode wire buffer")?;
    for msg in &messages {
        if args.json {
            println!("{}", serde_json::to_string(msg)?);
        } else {
            println!(
                "{:?} target={:#x}",
                msg.tag(),
                msg.target().to_bits()
            );
        }
    }
    eprintln!(
        "{} messages, {} bytes, {} strings",
        messages.len(),
        buf.len(),
        buf.strings().len()
    );
    Ok(())
}
