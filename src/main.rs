mod cli;

use anyhow::{anyhow, Context};
use clap::Parser;
use cli::{Cli, Cmd, PortOpts, PreviewOpts, StreamOpts, SIMULATED_PORT};
use gcodelink::{
    controller_config, init_logging, parse_file, Config, ControlEvent, ControllerConfig,
    EventFilter, MachineControl, MockPortOpener, PathPreview, StreamStatus,
};
use std::sync::{mpsc, Arc};
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json)?;
    tracing::debug!("gcodelink {} ({})", gcodelink::VERSION, gcodelink::BUILD_DATE);

    let config = Config::load_or_default(cli.config.as_deref()).context("Failed to load config")?;
    let mut settings = controller_config(&config);
    if let Some(baud) = cli.baud {
        settings.baud_rate = baud;
    }

    match &cli.cmd {
        Cmd::Ports => list_ports(&machine(&cli, settings)),
        Cmd::Preview(opts) => preview(opts),
        Cmd::Send(opts) => {
            let control = machine(&cli, settings);
            let port = resolve_port(&cli, &config, &opts.target)?;
            exchange(&control, &port, &opts.target, |c| c.send_raw(&opts.text))
        }
        Cmd::Jog(opts) => {
            let control = machine(&cli, settings);
            let port = resolve_port(&cli, &config, &opts.target)?;
            exchange(&control, &port, &opts.target, |c| c.jog(opts.direction))
        }
        Cmd::Stream(opts) => {
            if let Some(ms) = opts.pacing_ms {
                settings.pacing_interval = Duration::from_millis(ms);
            }
            let control = machine(&cli, settings);
            let port = resolve_port(&cli, &config, &opts.target)?;
            stream(&control, &port, opts)
        }
    }
}

/// Facade over real ports, or over one simulated controller
fn machine(cli: &Cli, settings: ControllerConfig) -> MachineControl {
    if !cli.simulate {
        return MachineControl::new(settings);
    }

    let opener = MockPortOpener::new();
    let port = opener.add_port(SIMULATED_PORT);
    port.push_line("Grbl 1.1h ['$' for help]");
    port.set_auto_reply(Some("ok"));
    tracing::info!("Simulating a controller on {}", SIMULATED_PORT);
    MachineControl::with_opener(settings, Arc::new(opener))
}

fn resolve_port(cli: &Cli, config: &Config, opts: &PortOpts) -> anyhow::Result<String> {
    opts.port
        .clone()
        .or_else(|| config.connection.port.clone())
        .or_else(|| cli.simulate.then(|| SIMULATED_PORT.to_string()))
        .ok_or_else(|| anyhow!("No port given; pass --port or set connection.port in the config"))
}

fn print_event(event: &ControlEvent) {
    match event {
        ControlEvent::MessageReceived(line) => println!("<< {}", line),
        ControlEvent::StreamProgress {
            line_number,
            lines_sent,
        } => println!("sent line {} ({} total)", line_number, lines_sent),
        other => println!("{}", other),
    }
}

fn list_ports(control: &MachineControl) -> anyhow::Result<()> {
    let ports = control.enumerate_ports();
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        if port.hardware_id.is_empty() {
            println!("{}\t{}", port.port_name, port.description);
        } else {
            println!("{}\t{}\t{}", port.port_name, port.description, port.hardware_id);
        }
    }
    Ok(())
}

fn preview(opts: &PreviewOpts) -> anyhow::Result<()> {
    let waypoints = parse_file(&opts.file)?;
    let preview = PathPreview::from_waypoints(&waypoints);

    if opts.waypoints {
        for point in &preview.points {
            println!("{} X{:.3} Y{:.3}", point.command, point.x, point.y);
        }
    }
    println!(
        "{} waypoints ({} rapid, {} cut)",
        waypoints.len(),
        preview.rapid_moves,
        preview.cut_moves
    );
    println!(
        "travel: {:.3} rapid, {:.3} cut",
        preview.rapid_distance, preview.cut_distance
    );
    match preview.bounds {
        Some(b) => println!(
            "bounds: X {:.3}..{:.3}, Y {:.3}..{:.3} ({:.3} x {:.3})",
            b.min_x,
            b.max_x,
            b.min_y,
            b.max_y,
            b.width(),
            b.height()
        ),
        None => println!("bounds: empty"),
    }
    Ok(())
}

/// Connect, run `action`, print replies for a while, disconnect
fn exchange(
    control: &MachineControl,
    port: &str,
    opts: &PortOpts,
    action: impl FnOnce(&MachineControl) -> gcodelink::Result<()>,
) -> anyhow::Result<()> {
    control.subscribe(EventFilter::All, |event| print_event(&event));
    control.connect(port)?;

    let result = action(control);
    if result.is_ok() {
        std::thread::sleep(Duration::from_millis(opts.wait_ms));
    }
    control.disconnect();
    Ok(result?)
}

fn stream(control: &MachineControl, port: &str, opts: &StreamOpts) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel();
    control.subscribe(EventFilter::All, move |event| {
        print_event(&event);
        if event.is_stream_end() || matches!(event, ControlEvent::TransportLost { .. }) {
            tx.send(event).ok();
        }
    });

    control.connect(port)?;
    control.stream_file(&opts.file)?;
    let end = rx.recv();

    // Let the last replies arrive before closing.
    std::thread::sleep(Duration::from_millis(opts.target.wait_ms));
    let status = control.stream_status();
    control.disconnect();

    match (end, status) {
        (_, Some(StreamStatus::Completed)) => Ok(()),
        (Ok(event), _) => Err(anyhow!("{}", event)),
        (Err(_), status) => Err(anyhow!("Stream ended without a result ({:?})", status)),
    }
}
