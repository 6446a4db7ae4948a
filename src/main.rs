#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Parser, Subcommand};
use itertools::Itertools;
use std::path::{Path, PathBuf};
use std::process;

use varpack::{EffectKind, IntegrandId, ModelStructure, MulcovTarget, PackedLayout, RateKind};

#[derive(Parser)]
#[command(
    name = "varpack",
    about = "Inspect the packed variable layout of a disease-rate model"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the offset table: mulstd, rate and covariate multiplier blocks
    Layout {
        /// Path to the model structure file (.toml)
        structure: PathBuf,
    },

    /// Print one row per packed variable as TSV
    Variables {
        /// Path to the model structure file (.toml)
        structure: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Layout { structure } => layout_command(&structure),
        Commands::Variables { structure } => variables_command(&structure),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn load(path: &Path) -> Result<(ModelStructure, PackedLayout), Box<dyn std::error::Error>> {
    log::info!("Loading model structure from: {}", path.display());
    let structure = ModelStructure::load(path)?;
    let layout = structure.layout()?;
    Ok((structure, layout))
}

fn layout_command(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (structure, layout) = load(path)?;
    let names = &structure.names;

    println!("size\t{}", layout.size());
    println!(
        "fixed_effects\t{}\trandom_effects\t{}",
        layout.fixed_effect_size(),
        layout.random_effect_size()
    );

    for (smoothing_id, _) in structure.catalog.iter() {
        println!(
            "mulstd\t{}\toffset\t{}",
            names.smoothings[smoothing_id.index()],
            layout.mulstd_offset(smoothing_id)?
        );
    }

    for rate in RateKind::ALL {
        let row = (0..=layout.child_count())
            .map(|child_index| layout.rate_info(rate, child_index))
            .collect::<Result<Vec<_>, _>>()?
            .iter()
            .map(|info| match info.smoothing_id {
                Some(id) => format!(
                    "{}@{}+{}",
                    names.smoothings[id.index()],
                    info.offset,
                    info.length
                ),
                None => "-".to_string(),
            })
            .join("\t");
        println!("rate\t{rate}\t{row}");
    }

    let targets = (0..layout.integrand_count())
        .flat_map(|id| {
            [EffectKind::MeasMean, EffectKind::MeasStd]
                .map(|kind| (kind, MulcovTarget::Integrand(IntegrandId(id))))
        })
        .chain(
            RateKind::ALL
                .into_iter()
                .map(|rate| (EffectKind::RateMean, MulcovTarget::Rate(rate))),
        );
    for (effect_kind, target) in targets {
        for k in 0..layout.mulcov_count(effect_kind, target)? {
            let info = layout.mulcov_info(effect_kind, target, k)?;
            let target_name = match target {
                MulcovTarget::Rate(rate) => rate.to_string(),
                MulcovTarget::Integrand(id) => names.integrands[id.0].clone(),
            };
            println!(
                "mulcov\t{effect_kind}\t{target_name}\t{}\t{}@{}+{}",
                names.covariates[info.covariate_id.0],
                names.smoothings[info.smoothing_id.index()],
                info.offset,
                info.length
            );
        }
    }
    Ok(())
}

fn variables_command(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (structure, layout) = load(path)?;
    println!("variable_id\tsmoothing\tvariable_name");
    for slot in layout.variables()? {
        println!(
            "{}\t{}\t{}",
            slot.index,
            structure.names.smoothings[slot.smoothing_id.index()],
            slot.label(&structure.names)
        );
    }
    Ok(())
}
