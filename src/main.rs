use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use keymouse::port::{describe, list_ports};
use keymouse::{FixedCalibration, Session};

mod cli;

use cli::{Cli, Cmd, parse_input};

fn main() -> Result<()> {
    let args = Cli::parse();
    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Cmd::Ports = args.cmd {
        for p in list_ports()? {
            println!("{}\t{}", p.port_name, describe(&p));
        }
        return Ok(());
    }

    let config = args.ser.session_config();
    let calibration = FixedCalibration::new(args.ser.screen, args.ser.pointer);
    let session = Session::open(&config, calibration).context("opening device")?;

    let result = run(&session, args.cmd);
    session.close();
    result
}

fn run(session: &Session<FixedCalibration>, cmd: Cmd) -> Result<()> {
    match cmd {
        Cmd::Ports => {}
        Cmd::Press { key } => session.press(parse_input(&key)?).context("press")?,
        Cmd::Release { key } => session.release(parse_input(&key)?).context("release")?,
        Cmd::ReleaseAll => session.release_all().context("release-all")?,
        Cmd::Click { button } => session.click(parse_input(&button)?).context("click")?,
        Cmd::FastClick { button } => session
            .fast_click(parse_input(&button)?)
            .context("fast-click")?,
        Cmd::Move { x, y } => session.move_to(x, y).context("move")?,
        Cmd::Bezier { x, y } => session.bezier_move(x, y).context("bezier")?,
        Cmd::Write { text, endl } => session.write(text, endl).context("write")?,
        Cmd::Type(opts) => session
            .type_text(&opts.text, opts.profile()?)
            .context("type")?,
    }
    Ok(())
}
