use std::env;
use std::process;

use htcc::{Credentials, HtccClientBuilder, TrafficLogMode, Zone};

const USAGE: &str = "usage: htcc [--user EMAIL] [--password PASS] [--name ZONE] \
[--show-info] [--heat TEMP | --cool TEMP] [--log FILE]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hold {
    Heat(i64),
    Cool(i64),
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    user: Option<String>,
    password: Option<String>,
    name: Option<String>,
    show_info: bool,
    hold: Option<Hold>,
    log: Option<String>,
    help: bool,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut opts = Options::default();
    let mut heat = None;
    let mut cool = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = || {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{arg} needs a value"))
        };
        match arg.as_str() {
            "--user" => opts.user = Some(value()?),
            "--password" => opts.password = Some(value()?),
            "--name" => opts.name = Some(value()?),
            "--log" => opts.log = Some(value()?),
            "--heat" => heat = Some(parse_temp(arg, &value()?)?),
            "--cool" => cool = Some(parse_temp(arg, &value()?)?),
            "--show-info" => opts.show_info = true,
            "--help" | "-h" => opts.help = true,
            other => return Err(format!("unknown argument {other}")),
        }
    }

    opts.hold = match (heat, cool) {
        (Some(_), Some(_)) => return Err("--heat and --cool are mutually exclusive".to_string()),
        (Some(t), None) => Some(Hold::Heat(t)),
        (None, Some(t)) => Some(Hold::Cool(t)),
        (None, None) => None,
    };
    Ok(opts)
}

fn parse_temp(flag: &str, value: &str) -> Result<i64, String> {
    value
        .parse()
        .map_err(|_| format!("{flag} expects a whole number, got {value:?}"))
}

async fn print_zone(zone: &mut Zone<'_>) -> htcc::Result<()> {
    let name = zone.name().to_string();
    let current = zone.current_temperature_with_unit().await?;
    let heat = zone.heat_setpoint_with_unit().await?;
    let cool = zone.cool_setpoint_with_unit().await?;
    let mode = zone.system_mode().await?;
    let fan = zone.fan_mode().await?;
    let running = if zone.is_fan_running().await? { " | RUNNING" } else { "" };

    println!("[{name}] {current} | heat {heat} | cool {cool} | mode: {mode:?} | fan: {fan:?}{running}");
    match zone.outdoor_temperature_with_unit().await {
        Ok(outdoor) => println!("Outdoor: {outdoor}"),
        Err(e) => println!("Outdoor: {e}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> htcc::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let opts = match parse_args(&args) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("{msg}\n{USAGE}");
            process::exit(2);
        }
    };
    if opts.help {
        println!("{USAGE}");
        return Ok(());
    }

    let credentials = Credentials::resolve(opts.user, opts.password)?;
    let mut builder = HtccClientBuilder::new(credentials);
    if let Some(path) = opts.log {
        builder = builder.traffic_log(TrafficLogMode::Summary, path);
    }
    let mut client = builder.build()?;

    println!("Logging in...");
    client.authenticate().await?;

    let mut zones = match &opts.name {
        Some(name) => vec![client.zone_by_name(name).await?],
        None => client.all_zones().await?,
    };

    for zone in &mut zones {
        if opts.show_info {
            println!("{}", serde_json::to_string_pretty(zone.info())?);
        }
        print_zone(zone).await?;

        match opts.hold {
            Some(Hold::Heat(temp)) => {
                zone.set_permanent_heat_setpoint(temp).await?;
                println!("[{}] heat held at {temp}", zone.name());
            }
            Some(Hold::Cool(temp)) => {
                zone.set_permanent_cool_setpoint(temp).await?;
                println!("[{}] cool held at {temp}", zone.name());
            }
            None => {}
        }
    }
    Ok(())
}
