use clap::{Arg, Command};

pub const CMD_SERVE: &str = "serve";
pub const ARG_PORT: &str = "port";

#[must_use]
pub fn command() -> Command {
    Command::new(CMD_SERVE).about("Run the HTTP server").arg(
        Arg::new(ARG_PORT)
            .short('p')
            .long(ARG_PORT)
            .help("Port to listen on")
            .default_value("8080")
            .env("TPAUTH_PORT")
            .value_parser(clap::value_parser!(u16)),
    )
}
