//! Enhancer → gene assignment and per factor/gene aggregation of binding.

use std::collections::{HashMap, HashSet};

use polars::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::interaction::weight::DistanceWeight;
use crate::models::{GeneRecord, Interval, IntervalIntersector, Region};
use crate::species::NamingPolicy;

/// Gene windows around the TSS and the enhancers they are matched against.
pub struct GeneWindows<'a> {
    pub genes: &'a [GeneRecord],
    pub enhancers: &'a [Region],
    pub chrom_sizes: &'a HashMap<String, u64>,
    pub policy: NamingPolicy,
}

impl GeneWindows<'_> {
    fn overlaps(
        &self,
        intersector: &dyn IntervalIntersector,
        up: u64,
        down: u64,
    ) -> Vec<(usize, usize)> {
        let windows: Vec<Interval> = self
            .genes
            .iter()
            .map(|g| {
                let (start, end) = g.flank_tss(up, down, self.chrom_sizes.get(&g.chrom).copied());
                Interval {
                    chrom: g.chrom.clone(),
                    start,
                    end,
                    name: g.name.clone(),
                }
            })
            .collect();
        let enhancers: Vec<Interval> = self
            .enhancers
            .iter()
            .map(|r| Interval {
                chrom: r.chrom.clone(),
                start: r.start,
                end: r.end,
                name: r.to_string(),
            })
            .collect();
        intersector
            .intersect(&windows, &enhancers)
            .into_iter()
            .map(|o| (o.a, o.b))
            .collect()
    }
}

/// `gene, loc` for every enhancer overlapping a promoter window.
pub fn promoter_table(
    windows: &GeneWindows,
    intersector: &dyn IntervalIntersector,
    up: u64,
    down: u64,
) -> Result<DataFrame> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let (mut genes, mut locs) = (Vec::new(), Vec::new());
    for (g, e) in windows.overlaps(intersector, up, down) {
        let gene = windows.policy.gene_name(&windows.genes[g].name);
        let loc = windows.enhancers[e].to_string();
        if seen.insert((gene.clone(), loc.clone())) {
            genes.push(gene);
            locs.push(loc);
        }
    }
    info!("{} promoter-enhancer pairs", genes.len());
    Ok(df!("gene" => genes, "loc" => locs)?)
}

/// `gene, loc, dist` for every enhancer within the long-range window, with
/// `dist = |enhancer midpoint - TSS|`. Each enhancer/gene pair keeps its
/// smallest distance; pairs at or beyond `cutoff` are dropped.
pub fn long_range_table(
    windows: &GeneWindows,
    intersector: &dyn IntervalIntersector,
    up: u64,
    down: u64,
    cutoff: u64,
) -> Result<DataFrame> {
    let mut best: HashMap<(String, String), u64> = HashMap::new();
    for (g, e) in windows.overlaps(intersector, up, down) {
        let gene = &windows.genes[g];
        let enhancer = &windows.enhancers[e];
        let dist = gene.tss().abs_diff(enhancer.midpoint());
        if dist >= cutoff {
            continue;
        }
        best.entry((windows.policy.gene_name(&gene.name), enhancer.to_string()))
            .and_modify(|d| *d = (*d).min(dist))
            .or_insert(dist);
    }

    let mut rows: Vec<((String, String), u64)> = best.into_iter().collect();
    rows.sort();
    let (mut genes, mut locs, mut dists) = (Vec::new(), Vec::new(), Vec::new());
    for ((gene, loc), dist) in rows {
        genes.push(gene);
        locs.push(loc);
        dists.push(dist as i64);
    }
    info!("{} long-range enhancer-gene pairs", genes.len());
    Ok(df!("gene" => genes, "loc" => locs, "dist" => dists)?)
}

/// Aggregates `factor, enhancer, binding` per factor and gene. Long-range
/// statistics come from `long_range`, `max_binding_in_promoter` from
/// `promoter`; a pair present in only one of them is kept, and a missing
/// promoter maximum is 0.
pub fn aggregate_binding(
    binding: DataFrame,
    promoter: DataFrame,
    long_range: DataFrame,
    weight: &DistanceWeight,
) -> Result<DataFrame> {
    let binding = binding.lazy().select([
        col("factor").cast(DataType::String),
        col("enhancer").cast(DataType::String),
        col("binding").cast(DataType::Float64),
    ]);

    let prom_table = binding
        .clone()
        .join(
            promoter.lazy(),
            [col("enhancer")],
            [col("loc")],
            JoinArgs::new(JoinType::Inner),
        )
        .group_by([col("factor"), col("gene")])
        .agg([col("binding").max().alias("max_binding_in_promoter")]);

    let weights = weight.table()?.lazy();
    let f_table = binding
        .join(
            long_range.lazy().with_column(col("dist").cast(DataType::Int64)),
            [col("enhancer")],
            [col("loc")],
            JoinArgs::new(JoinType::Inner),
        )
        .join(weights, [col("dist")], [col("dist")], JoinArgs::new(JoinType::Left))
        .with_columns([
            (col("binding") / col("binding").mean())
                .log(std::f64::consts::E)
                .alias("sum_logodds"),
            col("weight").fill_null(lit(0.0)),
        ])
        .with_columns([
            when(col("dist").gt(lit(0)))
                .then(col("sum_logodds") * lit(50_000.0) / col("dist").cast(DataType::Float64))
                .otherwise(lit(0.0))
                .alias("sum_weighted_logodds"),
            (col("binding") * col("weight")).alias("sum_dist_weight"),
        ])
        .group_by([col("factor"), col("gene")])
        .agg([
            col("sum_weighted_logodds").sum(),
            col("sum_dist_weight").sum(),
            col("sum_logodds").sum(),
            col("sum_logodds").max().alias("max_logodds"),
            col("binding").sum().alias("sum_binding"),
            col("binding").count().cast(DataType::Int64).alias("enhancers"),
            col("binding").max().alias("max_binding"),
            col("sum_dist_weight").max().alias("max_sum_dist_weight"),
        ]);

    let features = f_table
        .join(
            prom_table,
            [col("factor"), col("gene")],
            [col("factor"), col("gene")],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
        .with_columns([
            concat_str([col("factor"), col("gene")], "_", true).alias("source_target"),
            col("max_binding_in_promoter").fill_null(lit(0.0)),
            (col("sum_binding") + lit(1e-5))
                .log(std::f64::consts::E)
                .alias("log_sum_binding"),
            (col("enhancers").cast(DataType::Float64) + lit(1.0))
                .log(std::f64::consts::E)
                .alias("log_enhancers"),
        ])
        .select([
            col("source_target"),
            col("factor"),
            col("gene"),
            col("sum_weighted_logodds"),
            col("sum_dist_weight"),
            col("sum_logodds"),
            col("max_logodds"),
            col("sum_binding"),
            col("enhancers"),
            col("max_binding_in_promoter"),
            col("max_binding"),
            col("max_sum_dist_weight"),
            col("log_sum_binding"),
            col("log_enhancers"),
        ])
        .sort(["source_target"], SortMultipleOptions::default())
        .collect()?;
    info!("{} factor-gene pairs", features.height());
    Ok(features)
}
