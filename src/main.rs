use log::LevelFilter;
use order_relay::config::ClientConfig;
use order_relay::supervisor;
use std::env;
use std::process;

fn usage() -> ! {
    eprintln!(
        "usage: order-relay [key=value ...]\n\
         keys: log=true|false channel=<name> instType=<type> instId=<id>\n\
         \x20     logLevel=<worker count> wait=true|false gateway=<ws url>\n\
         \x20     apiKey=<key> sign=<sign>"
    );
    process::exit(2);
}

fn main() {
    let mut config = ClientConfig::default();
    let mut verbose = false;

    for arg in env::args().skip(1) {
        let Some((key, value)) = arg.split_once('=') else {
            eprintln!("invalid argument `{}`, expected key=value", arg);
            usage();
        };
        match key {
            "log" => verbose = value == "true",
            "channel" => config.channel = value.to_string(),
            "instType" => config.inst_type = value.to_string(),
            "instId" => config.inst_id = value.to_string(),
            "logLevel" => match value.parse() {
                Ok(count) => config.workers = count,
                Err(_) => {
                    eprintln!("logLevel must be a number, got `{}`", value);
                    usage();
                }
            },
            "wait" => config.wait_on_socket = value == "true",
            "gateway" => config.gateway_url = value.to_string(),
            "apiKey" => config.credentials.api_key = value.to_string(),
            "sign" => config.credentials.sign = value.to_string(),
            // Unknown keys are ignored; launch scripts may carry settings
            // for other tools.
            _ => {}
        }
    }

    env_logger::Builder::from_default_env()
        .filter_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    if let Err(err) = supervisor::run(config) {
        eprintln!("fatal: {}", err);
        process::exit(1);
    }
}
