// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod model;
mod report;

use crate::model::{ModelFile, derive};
use crate::report::{NumericReport, Report, write_report};

const EXIT_FAILURE: i32 = 1;

/// Bilinearize nonlinear dynamics described in a JSON model file.
#[derive(Parser, Debug)]
#[command(name = "bilin", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive the symbolic bilinear form and print it as JSON
    Derive {
        /// Path to the model file
        model: PathBuf,
        /// Expansion order, overriding the model file
        #[arg(long)]
        order: Option<u32>,
        /// Write the report here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Derive, then evaluate every matrix at a linearization point
    Eval {
        model: PathBuf,
        /// Comma-separated linearization point, one value per state
        #[arg(long, required = true, value_delimiter = ',', allow_negative_numbers = true)]
        at: Vec<f64>,
        #[arg(long)]
        order: Option<u32>,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Derive {
            model,
            order,
            output,
        } => {
            let derived = derive(&ModelFile::open(&model)?, order)?;
            write_report(&Report::symbolic(&derived), output.as_deref())
        }
        Command::Eval {
            model,
            at,
            order,
            output,
        } => {
            let derived = derive(&ModelFile::open(&model)?, order)?;
            let mut report = Report::symbolic(&derived);
            report.numeric = Some(NumericReport::at(&derived, &at)?);
            write_report(&report, output.as_deref())
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("error: {err:#}");
        std::process::exit(EXIT_FAILURE);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::CommandFactory;

    use super::*;
    use crate::model::tests::PENDULUM;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_eval_args() {
        let args = Args::try_parse_from(["bilin", "eval", "m.json", "--at", "-0.5,2", "--order", "3"])
            .unwrap();
        match args.command {
            Command::Eval { at, order, .. } => {
                assert_eq!(vec![-0.5, 2.0], at);
                assert_eq!(Some(3), order);
            }
            _ => panic!("expected eval"),
        }
        assert!(Args::try_parse_from(["bilin", "eval", "m.json"]).is_err());
    }

    #[test]
    fn test_run() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("pendulum.json");
        fs::write(&model, PENDULUM).unwrap();
        let output = dir.path().join("out.json");

        run(Args {
            command: Command::Eval {
                model: model.clone(),
                at: vec![0.1, 0.2],
                order: Some(3),
                output: Some(output.clone()),
            },
        })
        .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(3, json["order"]);
        assert_eq!(9, json["n"]);

        let err = run(Args {
            command: Command::Derive {
                model: dir.path().join("missing.json"),
                order: None,
                output: None,
            },
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("missing.json"));
    }
}
