// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn bundle_arg() -> Arg {
    Arg::new("bundle")
        .required(true)
        .help("Bundle name (<distribution>/<number>)")
}

fn own_suite_arg() -> Arg {
    Arg::new("own_suite")
        .long("own-suite")
        .default_value("bundle:{bundle}")
        .help("Selector of the bundle's own suite")
}

fn no_update_arg() -> Arg {
    Arg::new("no_update")
        .long("no-update")
        .action(ArgAction::SetTrue)
        .help("Use cached indices instead of refreshing them")
}

fn remark_arg() -> Arg {
    Arg::new("remark")
        .long("remark")
        .help("Line written verbatim at the top of the file")
}

fn build_cli() -> Command {
    Command::new("reprepro-bundle")
        .version(env!("CARGO_PKG_VERSION"))
        .author("reprepro-bundle Contributors")
        .about("Maintain sources control lists and blacklists of reprepro bundles")
        .subcommand_required(false)
        .arg(
            Arg::new("basedir")
                .short('b')
                .long("basedir")
                .global(true)
                .default_value(".")
                .help("Project base directory containing repo/bundle"),
        )
        .arg(
            Arg::new("catalog")
                .short('c')
                .long("catalog")
                .global(true)
                .help("Suite catalog (default: <basedir>/.apt-repos/suites.json)"),
        )
        .subcommand(
            Command::new("update-scl")
                .about("Update the sources control list of a bundle")
                .arg(bundle_arg())
                .arg(own_suite_arg())
                .arg(
                    Arg::new("supplier")
                        .short('s')
                        .long("supplier")
                        .default_value("")
                        .help("Selector of suites packages may be taken from"),
                )
                .arg(
                    Arg::new("reference")
                        .short('r')
                        .long("reference")
                        .default_value("bundle:{bundle}")
                        .help("Selector of suites defining the current versions"),
                )
                .arg(
                    Arg::new("highlighted")
                        .long("highlighted")
                        .default_value("")
                        .help("Selector of suites whose sources are listed on top"),
                )
                .arg(
                    Arg::new("add_from")
                        .long("add-from")
                        .default_value("")
                        .help("Selector of suites whose missing sources are added"),
                )
                .arg(
                    Arg::new("upgrade_from")
                        .long("upgrade-from")
                        .default_value("")
                        .help("Selector of suites whose upgrades are taken"),
                )
                .arg(no_update_arg())
                .arg(remark_arg()),
        )
        .subcommand(
            Command::new("update-blacklist")
                .about("Update the binary package blacklist of a bundle")
                .arg(bundle_arg())
                .arg(own_suite_arg())
                .arg(no_update_arg())
                .arg(remark_arg()),
        )
        .subcommand(
            Command::new("normalize")
                .about("Drop all inactive lines from a bundle's control files")
                .arg(bundle_arg()),
        )
        .subcommand(
            Command::new("info")
                .about("Print a field of a bundle's info file")
                .arg(bundle_arg())
                .arg(
                    Arg::new("tag")
                        .default_value("Bundlename")
                        .help("Field name"),
                ),
        )
        .subcommand(
            Command::new("update-info")
                .about("Rewrite Bundlename (and BasedOn) in a bundle's info file")
                .arg(bundle_arg())
                .arg(
                    Arg::new("based_on")
                        .long("based-on")
                        .help("Bundle this one is based on"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("reprepro-bundle.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
