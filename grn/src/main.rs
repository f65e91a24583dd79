use std::path::PathBuf;

use clap::{crate_version, value_parser, Arg, ArgMatches, Command};
use tracing::info;
use tracing_subscriber::EnvFilter;

use grn::config::GrnConfig;
use grn::interaction::SortedIntersector;
use grn::pipeline::{calculate_features, predict_binding, Collaborators};

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .required(true)
        .num_args(1)
        .value_parser(value_parser!(PathBuf))
        .help("JSON run configuration")
}

fn load_config(args: &ArgMatches) -> anyhow::Result<GrnConfig> {
    let Some(path) = args.get_one::<PathBuf>("config") else {
        anyhow::bail!("--config is required");
    };
    info!("Reading configuration from {}", path.display());
    Ok(GrnConfig::from_path(path)?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app = Command::new("grn")
        .version(crate_version!())
        .about("TF binding prediction and regulatory network features")
        .propagate_version(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("binding")
                .about("Predict binding of every TF in the motif database")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("network")
                .about("Aggregate binding into TF-gene features")
                .arg(config_arg()),
        );

    match app.get_matches().subcommand() {
        Some(("binding", sub)) => {
            let cfg = load_config(sub)?;
            let store = predict_binding(&cfg.binding, &Collaborators::default())?;
            info!(
                "Binding for {} factors written to {}",
                store.factors().len(),
                cfg.binding.outdir.display()
            );
        }
        Some(("network", sub)) => {
            let cfg = load_config(sub)?;
            calculate_features(&cfg.network, &SortedIntersector)?;
        }
        _ => unreachable!(),
    }

    Ok(())
}
