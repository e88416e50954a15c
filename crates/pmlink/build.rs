use std::fs;
use std::path::Path;

use clap::CommandFactory;

// cli.rs only needs clap and clap_complete, both build-dependencies.
#[path = "src/cli.rs"]
mod cli;

fn main() {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let out_dir = std::env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo");
    let man_dir = Path::new(&out_dir).join("man");
    fs::create_dir_all(&man_dir).expect("create man page directory");

    render_pages(&cli::Cli::command(), &man_dir);
}

/// Write `<name>.1` for the command, then `<name>-<sub>.1` for every visible
/// subcommand.
fn render_pages(cmd: &clap::Command, dir: &Path) {
    let name = cmd.get_name().to_owned();
    let mut page = Vec::new();
    clap_mangen::Man::new(cmd.clone())
        .render(&mut page)
        .unwrap_or_else(|e| panic!("rendering man page for `{name}`: {e}"));

    let path = dir.join(format!("{name}.1"));
    fs::write(&path, page).unwrap_or_else(|e| panic!("writing {}: {e}", path.display()));

    for sub in cmd.get_subcommands().filter(|sub| !sub.is_hide_set()) {
        let renamed = sub.clone().name(format!("{name}-{}", sub.get_name()));
        render_pages(&renamed, dir);
    }
}
