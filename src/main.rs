extern crate bgcscan;

extern crate clap;
use clap::*;

#[macro_use]
extern crate log;

extern crate bird_tool_utils;
use bird_tool_utils::clap_utils::*;

static PROGRAM_NAME: &str = "bgcscan";

fn main() {
    let app = build_cli();
    let matches = app.get_matches();
    set_log_level(&matches, false, PROGRAM_NAME, crate_version!());

    match matches.subcommand_name() {
        Some("detect") => {
            let m = matches
                .subcommand_matches("detect")
                .expect("Programming error: detect subcommand matched but not found");
            set_log_level(m, true, PROGRAM_NAME, crate_version!());

            if let Err(e) = bgcscan::cluster_argument_parsing::run_detect_subcommand(&matches) {
                error!("{}", e);
                std::process::exit(1);
            }
        }
        _ => panic!("Programming error"),
    }
}

fn build_cli() -> Command {
    let app = add_clap_verbosity_flags(Command::new("bgcscan"))
        .version(crate_version!())
        .author(bgcscan::AUTHOR)
        .about("Biosynthetic gene cluster detection from protein domain annotations")
        .arg_required_else_help(true);

    bgcscan::cluster_argument_parsing::add_detect_subcommand(app)
}
