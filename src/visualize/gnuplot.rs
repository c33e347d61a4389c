//! gnuplot scripts for the exported data files.
//!
//! Scripts pick up their data files by naming convention, so they can be
//! rerun by hand in the output directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use log::{debug, info};

use super::{write_file, CDF_PREFIX, INJECTION_PREFIX, SEPARATOR};

pub const INJECTION_SCRIPT: &str = "plot_inj.gnuplot";
pub const CDF_SCRIPT: &str = "plot_cdf.gnuplot";

fn script_header(trace_name: &str, prefix: &str) -> String {
    format!(
        "#{trace_name}\n\
         set terminal pngcairo size 800,600 enhanced font 'Arial-Bold,16'\n\
         #set terminal postscript eps enhanced color font 'Arial-Bold,16'\n\
         datafiles = system('ls {prefix}*.csv')\n\
         set datafile separator \"{SEPARATOR}\"\n\
         \n"
    )
}

fn script_loop(trace_name: &str, style: &str, sections: usize) -> String {
    let plots: Vec<String> = (0..sections)
        .map(|i| format!("\t\tfile i {i} u 1:3 w {style} t columnheader(1)"))
        .collect();
    format!(
        "node = 1\n\
         do for [file in datafiles] {{\n\
         \t#set title sprintf('{trace_name}: Node %d', node) noenhanced\n\
         \tnode = node + 1\n\
         \tset output sprintf('%s.png', file)\n\
         \t#set output sprintf('%s.eps', file)\n\
         \tplot \\\n\
         {}\n\
         }}\n",
        plots.join(", \\\n")
    )
}

/// Script plotting message size over runtime from the `inj-p*.csv` files.
pub fn injection_script(trace_name: &str) -> String {
    let mut script = script_header(trace_name, INJECTION_PREFIX);
    script.push_str(
        "set xrange [0:]\n\
         set autoscale y\n\
         set logscale y\n\
         \n\
         set format y '%1.1e'; set ytics(1e1,1e2,1e3,1e4,1e5,1e6,1e7,1e8,1e9)\n\
         \n\
         set xlabel 'Application Runtime [seconds]'\n\
         set ylabel 'Message Size [Bytes]'\n\
         \n\
         set key horiz out bot center\n\
         set key font ',14' spacing 1.0 samplen 1\n\
         \n",
    );
    script.push_str(&script_loop(trace_name, "points", 4));
    script
}

/// Script plotting the message size CDFs from the `cdf-p*.csv` files.
pub fn cdf_script(trace_name: &str) -> String {
    let mut script = script_header(trace_name, CDF_PREFIX);
    script.push_str(
        "set logscale x\n\
         set yrange [0:1.02]\n\
         \n\
         set xlabel 'Bytes'\n\
         set ylabel 'Probability'\n\
         \n\
         set grid\n\
         set key horiz out bot center\n\
         set key font ',14' spacing 1.0 samplen 1\n\
         \n",
    );
    script.push_str(&script_loop(trace_name, "linespoints", 2));
    script
}

/// Write both scripts into `dir`.
pub fn write_scripts(dir: &Path, trace_name: &str) -> Result<Vec<PathBuf>> {
    let scripts = [
        (INJECTION_SCRIPT, injection_script(trace_name)),
        (CDF_SCRIPT, cdf_script(trace_name)),
    ];

    let mut written = Vec::with_capacity(scripts.len());
    for (name, text) in scripts {
        let path = dir.join(name);
        write_file(&path, &text)?;
        written.push(path);
    }
    Ok(written)
}

/// True if `gnuplot --version` runs successfully.
pub fn gnuplot_available() -> bool {
    Command::new("gnuplot")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Run `gnuplot <script>` with `dir` as working directory.
pub fn run_gnuplot(dir: &Path, script: &str) -> Result<()> {
    debug!("(cd {} && gnuplot {script})", dir.display());
    let status = Command::new("gnuplot")
        .arg(script)
        .current_dir(dir)
        .status()
        .with_context(|| format!("Failed to run gnuplot on {script}"))?;

    if !status.success() {
        bail!("gnuplot returned with non-zero ({status}) for {script}");
    }
    info!("Rendered {script}");
    Ok(())
}
