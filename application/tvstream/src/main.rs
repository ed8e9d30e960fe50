use {
    anyhow::{anyhow, Result},
    clap::{value_parser, Arg, ArgAction, ArgMatches, Command},
    env_logger_extend::logger::Logger,
    std::{env, str::FromStr},
    tokio::signal,
    tvstream::{
        config::{self, Config},
        service::Service,
    },
    xmpegts::packet::StreamDescriptor,
};

fn command() -> Command {
    let log_levels = vec!["trace", "debug", "info", "warn", "error"];

    Command::new("tvstream")
        .bin_name("tvstream")
        .version("0.1.0")
        .author("HarlanC <wawacry@qq.com>")
        .about("Pulls mms streams and demultiplexes ts captures.")
        .subcommand_required(true)
        .arg(
            Arg::new("config_file_path")
                .long("config")
                .short('c')
                .value_name("path")
                .help("Specify the configuration file path.")
                .value_parser(value_parser!(String))
                .global(true),
        )
        .arg(
            Arg::new("log")
                .long("log")
                .short('l')
                .value_name("level")
                .help("Specify the log level, ignored when a configuration file sets one.")
                .value_parser(log_levels)
                .global(true),
        )
        .subcommand(
            Command::new("pull")
                .about("Save an mms/mmst/mmsh stream to a file.")
                .arg(
                    Arg::new("url")
                        .long("url")
                        .short('u')
                        .value_name("url")
                        .required(true)
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_name("file")
                        .required(true)
                        .value_parser(value_parser!(String)),
                ),
        )
        .subcommand(
            Command::new("demux")
                .about("Demultiplex a ts capture into framed stream packets.")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .short('i')
                        .value_name("file")
                        .required(true)
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_name("file")
                        .required(true)
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("pid")
                        .long("pid")
                        .short('p')
                        .value_name("pid:type[:lang]")
                        .help("A stream to extract, e.g. 0x44:h264 or 68:mpegaudio:eng.")
                        .required(true)
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(String)),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let log_level = match matches.get_one::<String>("log") {
        Some(val) => val.clone(),
        None => String::from("info"),
    };

    let mut config = match matches.get_one::<String>("config_file_path") {
        Some(path) => config::load(path).map_err(|err| anyhow!("{}: {}", path, err))?,
        None => Config::new(log_level.clone()),
    };
    if config.log.is_none() {
        config.log = Config::new(log_level).log;
    }
    Ok(config)
}

fn init_logger(config: &Config) -> Result<Logger> {
    let (level, target) = match &config.log {
        Some(log) => (
            log.level.clone(),
            log.file_target().map_err(|err| anyhow!("{}", err))?,
        ),
        None => (String::from("info"), None),
    };

    match target {
        Some((rotate, path)) => Logger::new(&level, Some(rotate), Some(path)),
        None => Logger::new(&level, None, None),
    }
}

fn parse_streams(matches: &ArgMatches) -> Result<Vec<StreamDescriptor>> {
    let mut streams = Vec::new();
    if let Some(values) = matches.get_many::<String>("pid") {
        for value in values {
            let descriptor =
                StreamDescriptor::from_str(value).map_err(|err| anyhow!("--pid {}", err))?;
            streams.push(descriptor);
        }
    }
    Ok(streams)
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cmd = command();

    let args: Vec<String> = env::args().collect();
    if 1 == args.len() {
        cmd.print_help()?;
        return Ok(());
    }

    let matches = cmd.get_matches();
    let config = load_config(&matches)?;
    let _logger = init_logger(&config)?;
    let service = Service::new(config);

    match matches.subcommand() {
        Some(("pull", sub)) => {
            let url = sub
                .get_one::<String>("url")
                .ok_or_else(|| anyhow!("missing --url"))?;
            let output = sub
                .get_one::<String>("output")
                .ok_or_else(|| anyhow!("missing --output"))?;

            tokio::select! {
                result = service.pull(url, output) => {
                    result?;
                }
                _ = signal::ctrl_c() => {
                    log::info!("interrupted, {} may be incomplete", output);
                }
            }
        }
        Some(("demux", sub)) => {
            let input = sub
                .get_one::<String>("input")
                .ok_or_else(|| anyhow!("missing --input"))?;
            let output = sub
                .get_one::<String>("output")
                .ok_or_else(|| anyhow!("missing --output"))?;
            let streams = parse_streams(sub)?;

            tokio::select! {
                result = service.demux(input, output, streams) => {
                    result?;
                }
                _ = signal::ctrl_c() => {
                    log::info!("interrupted, {} may be incomplete", output);
                }
            }
        }
        _ => {
            command().print_help()?;
        }
    }

    Ok(())
}
