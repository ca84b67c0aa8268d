use std::net::IpAddr;
use std::time::Duration;
use std::{panic, process};

use clap::{Arg, Command};
use log::info;

use oledcast::capture::Region;
use oledcast::config::{StreamConfig, app_name, version};
use oledcast::pipeline::StreamManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new(app_name())
        .version(version())
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("device")
                .short('d')
                .long("device")
                .value_name("IP")
                .help("IP address of the OLED device.")
                .default_value(oledcast::assets::DEFAULT_DEVICE_ADDR),
        )
        .arg(
            Arg::new("fps")
                .short('f')
                .long("fps")
                .value_name("FPS")
                .help("Frames per second (1-30).")
                .default_value("10"),
        )
        .arg(
            Arg::new("quality")
                .short('q')
                .long("quality")
                .value_name("QUALITY")
                .help("Preview JPEG quality (1-100).")
                .default_value("50"),
        )
        .arg(
            Arg::new("region")
                .short('r')
                .long("region")
                .value_name("X,Y,W,H")
                .help("Capture subrectangle of the primary display."),
        )
        .arg(
            Arg::new("duration")
                .long("duration")
                .value_name("SECONDS")
                .help("Stop after this many seconds instead of waiting for Ctrl-C."),
        )
        .arg(
            Arg::new("capture")
                .short('c')
                .long("capture")
                .value_name("FILE")
                .help("Capture a single JPEG to FILE and exit."),
        )
        .get_matches();

    let region = matches
        .get_one::<String>("region")
        .map(|s| parse_region(s))
        .transpose()?;

    // kill the main thread as soon as a secondary task panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // invoke the default handler and exit the process
        orig_hook(panic_info);
        process::exit(105);
    }));

    let manager = StreamManager::new();

    if let Some(path) = matches.get_one::<String>("capture") {
        let jpeg = manager.capture_once(region)?;
        std::fs::write(path, &jpeg)?;
        info!("wrote {} bytes to {path}", jpeg.len());
        return Ok(());
    }

    let device: IpAddr = matches.get_one::<String>("device").unwrap().parse()?;
    let fps: u32 = matches.get_one::<String>("fps").unwrap().parse()?;
    let quality: u8 = matches.get_one::<String>("quality").unwrap().parse()?;

    let mut config = StreamConfig::new(device, fps, quality)?;
    if let Some(region) = region {
        config = config.with_region(region);
    }

    manager.start(config).await?;
    info!("streaming to {device}:8888, Ctrl-C to stop");

    match matches.get_one::<String>("duration") {
        Some(seconds) => tokio::time::sleep(Duration::from_secs(seconds.parse()?)).await,
        None => tokio::signal::ctrl_c().await?,
    }

    manager.stop().await?;
    info!("stopped after {} frames", manager.frames_streamed());
    Ok(())
}

fn parse_region(arg: &str) -> anyhow::Result<Region> {
    let parts: Vec<u32> = arg
        .split(',')
        .map(|part| part.trim().parse())
        .collect::<Result<_, _>>()?;
    let [x, y, width, height]: [u32; 4] = parts
        .try_into()
        .map_err(|_| anyhow::anyhow!("region must be given as x,y,width,height"))?;
    Ok(Region::new(x, y, width, height)?)
}
