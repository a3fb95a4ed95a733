// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: formula directory
fn formula_dir_arg() -> Arg {
    Arg::new("formula_dir")
        .short('f')
        .long("formula-dir")
        .value_name("DIR")
        .default_value("./formulas")
        .help("Directory of formula TOML files")
}

/// Common argument: engine state directory
fn state_dir_arg() -> Arg {
    Arg::new("state_dir")
        .short('s')
        .long("state-dir")
        .value_name("DIR")
        .help("Engine state directory (default: /var/lib/cellar)")
}

fn build_cli() -> Command {
    Command::new("cellar")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Build-from-source formula engine")
        .subcommand(
            Command::new("install")
                .about("Install a formula and its dependencies")
                .arg(Arg::new("name").required(true).help("Formula name"))
                .arg(formula_dir_arg())
                .arg(state_dir_arg())
                .arg(
                    Arg::new("keep_workdir")
                        .long("keep-workdir")
                        .action(clap::ArgAction::SetTrue)
                        .help("Keep build working directories for debugging"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(clap::ArgAction::SetTrue)
                        .help("Print the install report as JSON"),
                ),
        )
        .subcommand(
            Command::new("test")
                .about("Run a formula's test steps against its installed prefix")
                .arg(Arg::new("name").required(true).help("Formula name"))
                .arg(formula_dir_arg())
                .arg(state_dir_arg()),
        )
        .subcommand(
            Command::new("fetch")
                .about("Download and verify a formula's source without building")
                .arg(Arg::new("name").required(true).help("Formula name"))
                .arg(formula_dir_arg())
                .arg(state_dir_arg()),
        )
        .subcommand(
            Command::new("list")
                .about("List ledger entries")
                .arg(state_dir_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(clap::ArgAction::SetTrue)
                        .help("Print entries as JSON"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("cellar.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
