//! The two steps of the network build: binding prediction per factor and the
//! factor/gene feature table.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, error, info};

use crate::activity::predict_factor_activity;
use crate::binding_store::BindingStore;
use crate::config::{BindingConfig, FactorSelection, NetworkConfig};
use crate::data_handling::annotation::load_genes;
use crate::data_handling::bedgraph::BedGraphSignalReader;
use crate::data_handling::genome::ChromSizesGenome;
use crate::data_handling::motif2factors::{
    factor_motifs, load_factor_motifs, load_valid_factors, merge_factor_motifs, read_associations,
    AssociationFilter, FactorMotifs,
};
use crate::data_handling::reference::ReferenceDir;
use crate::data_handling::regions::load_regions;
use crate::error::{GrnError, Result};
use crate::features::assemble_regions;
use crate::features::source::RegionSource;
use crate::helper_functions::{column_str, write_tsv};
use crate::interaction::network::{
    correlation_table, expression_table, factor_expression_table, join_features,
};
use crate::interaction::{
    aggregate_binding, long_range_table, promoter_table, DistanceWeight, GeneWindows,
    SortedIntersector,
};
use crate::models::{
    GenomeProvider, IntervalIntersector, ModelStore, MotifScanner, Region, SignalReader,
};
use crate::motif_graph::MotifGraph;
use crate::prediction_tools::JsonModelStore;
use crate::predictor::BindingSession;
use crate::species::{warn_unsupported_species, FactorListing, NamingPolicy, Species};

/// Implementations of the external capabilities used by the pipelines.
pub struct Collaborators {
    pub reader: Arc<dyn SignalReader>,
    pub scanner: Option<Arc<dyn MotifScanner>>,
    /// Defaults to JSON models in the reference directory.
    pub store: Option<Arc<dyn ModelStore>>,
    pub intersector: Arc<dyn IntervalIntersector>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            reader: Arc::new(BedGraphSignalReader),
            scanner: None,
            store: None,
            intersector: Arc::new(SortedIntersector),
        }
    }
}

fn check_input_files(files: &[&Path]) -> Result<()> {
    let missing: Vec<String> = files
        .iter()
        .filter(|f| !f.exists())
        .map(|f| f.display().to_string())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    for file in &missing {
        error!("Could not find {}", file);
    }
    Err(GrnError::InvalidInput(format!(
        "{} input file(s) not found: {}",
        missing.len(),
        missing.join(", ")
    )))
}

/// Factor → motifs for prediction, and the motif graph. The graph is built
/// from every association regardless of the factor selection, and links
/// factors of a custom table to the reference factors through shared motifs.
fn load_motif_database(
    cfg: &BindingConfig,
    policy: NamingPolicy,
    allowlist: Option<&HashSet<String>>,
) -> Result<(FactorMotifs, MotifGraph)> {
    let table = cfg
        .motif2factors
        .as_deref()
        .unwrap_or(&cfg.reference_motif2factors);
    info!("Loading motif associations from {}", table.display());
    let associations = read_associations(table)?;

    let selected: Option<HashSet<String>> = match &cfg.factors {
        Some(selection) => Some(selection.names()?.into_iter().collect()),
        None => None,
    };
    let f2m = factor_motifs(
        &associations,
        AssociationFilter {
            indirect: cfg.indirect,
            factors: selected.as_ref(),
            policy,
            allowlist,
        },
    )?;
    let n = f2m.len();
    info!("  Using motifs for {} factor{}", n, if n == 1 { "" } else { "s" });

    let complete_filter = AssociationFilter {
        allowlist,
        ..AssociationFilter::unfiltered(policy)
    };
    let mut complete = if !cfg.indirect || selected.is_some() {
        factor_motifs(&associations, complete_filter)?
    } else {
        f2m.clone()
    };
    if cfg.motif2factors.is_some() {
        let reference = load_factor_motifs(&cfg.reference_motif2factors, complete_filter)?;
        merge_factor_motifs(&mut complete, &reference);
    }
    let graph = MotifGraph::build(&complete);
    info!(
        "  Motif graph links {} factors by {} shared-motif edges",
        graph.node_count(),
        graph.edge_count()
    );
    Ok((f2m, graph))
}

/// Predicts binding for every factor and writes the binding store to
/// `cfg.outdir`.
pub fn predict_binding(cfg: &BindingConfig, collaborators: &Collaborators) -> Result<BindingStore> {
    if cfg.atac_files.is_empty() && cfg.histone_files.is_empty() {
        return Err(GrnError::InvalidInput(
            "need either ATAC-seq or H3K27ac coverage file(s)".to_string(),
        ));
    }
    let mut inputs: Vec<&Path> = cfg
        .atac_files
        .iter()
        .chain(&cfg.histone_files)
        .chain(&cfg.regions)
        .map(PathBuf::as_path)
        .collect();
    inputs.extend(cfg.pfmscorefile.as_deref());
    if let Some(FactorSelection::File(path)) = &cfg.factors {
        inputs.push(path.as_path());
    }
    check_input_files(&inputs)?;

    let reference = ReferenceDir::open(cfg.reference.as_deref().unwrap_or(&cfg.default_reference))?;
    let genome = ChromSizesGenome::from_path(&cfg.genome, cfg.tax_id)?;
    let species = Species::infer(&genome);
    warn_unsupported_species(genome.name(), species, cfg.motif2factors.is_some());
    let policy = NamingPolicy::for_species(species);

    let allowlist = match (&cfg.valid_factors, policy.listing) {
        (Some(path), FactorListing::Allowlist) => Some(load_valid_factors(path)?),
        (None, FactorListing::Allowlist) => {
            debug!("No factor allowlist given, keeping every factor");
            None
        }
        _ => None,
    };
    let (f2m, graph) = load_motif_database(cfg, policy, allowlist.as_ref())?;

    let regions = if cfg.regions.is_empty() {
        None
    } else {
        Some(load_regions(&cfg.regions)?)
    };
    let source = RegionSource::resolve(cfg.reference.is_some(), regions, cfg.pfmscorefile.clone())?;
    let features = assemble_regions(
        &source,
        &f2m,
        &reference,
        collaborators.scanner.as_deref(),
        &genome,
    )?;

    let store: Arc<dyn ModelStore> = match &collaborators.store {
        Some(store) => Arc::clone(store),
        None => Arc::new(JsonModelStore::new(reference.root())),
    };
    let mut session = BindingSession::new(policy, allowlist, f2m, graph, features, reference, store);
    let reader = collaborators.reader.as_ref();
    if !cfg.atac_files.is_empty() {
        session.load_atac(&cfg.atac_files, reader, cfg.seed, false)?;
    }
    if !cfg.histone_files.is_empty() {
        session.load_histone(&cfg.histone_files, reader, cfg.seed, false)?;
    }
    session.refresh_models()?;

    let mut output = BindingStore::default();
    for table in session.atac().into_iter().chain(session.histone()) {
        output.put(table.kind.store_key(), table.to_frame(session.regions())?);
    }

    info!("Predicting TF activity");
    let activity = predict_factor_activity(&session, cfg.activity_regions, cfg.seed)?;
    output.put_activity(&activity)?;

    info!("Predicting binding per TF:");
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.ncore.max(1))
        .build()
        .map_err(|e| GrnError::InvalidInput(format!("thread pool: {e}")))?;
    let factors = session.factors();
    let predictions: Vec<_> = pool.install(|| {
        factors
            .par_iter()
            .map(|factor| session.predict_proba(Some(factor.as_str()), None, cfg.jaccard_cutoff))
            .collect()
    });

    let mut predicted = 0usize;
    for (factor, prediction) in factors.iter().zip(predictions) {
        match prediction {
            Ok(prediction) => {
                output.put_prediction(&prediction, session.regions())?;
                predicted += 1;
            }
            Err(e) if e.is_recoverable() => debug!("Skipping {}: {}", factor, e),
            Err(e) => return Err(e),
        }
    }
    if predicted == 0 {
        return Err(GrnError::MissingData(format!(
            "binding prediction failed for all {} factors; check the log output",
            factors.len()
        )));
    }
    info!("Predicted binding for {} of {} factors", predicted, factors.len());

    output.put_index(session.regions())?;
    output.write(&cfg.outdir)?;
    Ok(output)
}

/// Aggregates the binding of `cfg.binding` per factor and gene and writes
/// `weight.tsv`, `factor_expression.tsv`, `features.tsv` and
/// `full_features.tsv` to `cfg.outdir`.
pub fn calculate_features(cfg: &NetworkConfig, intersector: &dyn IntervalIntersector) -> Result<DataFrame> {
    cfg.validate()?;
    fs::create_dir_all(&cfg.outdir).map_err(|e| GrnError::io(e, &cfg.outdir))?;

    let genome = ChromSizesGenome::from_path(&cfg.genome, cfg.tax_id)?;
    let policy = NamingPolicy::for_species(Species::infer(&genome));
    let genes = load_genes(&cfg.annotation)?;
    let binding = BindingStore::read_long(&cfg.binding)?;

    let enhancers = column_str(&binding, "enhancer")?
        .into_iter()
        .collect::<BTreeSet<_>>()
        .iter()
        .map(|s| s.parse::<Region>())
        .collect::<Result<Vec<_>>>()?;
    let windows = GeneWindows {
        genes: &genes,
        enhancers: &enhancers,
        chrom_sizes: genome.chrom_sizes(),
        policy,
    };

    info!("Promoter overlap");
    let promoter = promoter_table(&windows, intersector, cfg.promoter_up, cfg.promoter_down)?;
    info!("Gene overlap");
    let long_range = long_range_table(
        &windows,
        intersector,
        cfg.window_up,
        cfg.window_down,
        cfg.long_range_cutoff,
    )?;

    let weight = DistanceWeight::from_config(cfg);
    write_tsv(&mut weight.table()?, &cfg.outdir.join("weight.tsv"))?;

    let factors: Vec<String> = match &cfg.motif2factors {
        Some(path) => read_associations(path)?.into_iter().map(|a| a.factor).collect(),
        None => column_str(&binding, "factor")?,
    };
    let mut factor_expression =
        factor_expression_table(&factors, &cfg.expression, &cfg.expression_column)?;
    write_tsv(&mut factor_expression, &cfg.outdir.join("factor_expression.tsv"))?;

    let mut features = aggregate_binding(binding, promoter, long_range, &weight)?;
    write_tsv(&mut features, &cfg.outdir.join("features.tsv"))?;

    let mut others = Vec::new();
    if !cfg.expression.is_empty() {
        others.push(expression_table(&features, &cfg.expression, &cfg.expression_column)?);
    }
    if !cfg.correlation.is_empty() {
        others.push(correlation_table(&features, &cfg.correlation)?);
    }
    let mut full = join_features(features, &others)?;
    let outfile = cfg.outdir.join("full_features.tsv");
    write_tsv(&mut full, &outfile)?;
    info!("Wrote {} factor-gene pairs to {}", full.height(), outfile.display());
    Ok(full)
}
