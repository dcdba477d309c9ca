use std::{
	collections::HashSet,
	fs,
	path::{Path, PathBuf},
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use reef_config::Config;
use reef_service::{ReefService, RetrieveRequest, RetrieveResponse};

#[derive(Debug, Parser)]
#[command(
	version = reef_cli::VERSION,
	rename_all = "kebab",
	styles = reef_cli::styles(),
)]
pub struct Args {
	#[arg(long = "config-a", short = 'c', value_name = "FILE", visible_alias = "config")]
	pub config_a: PathBuf,
	#[arg(long = "config-b", value_name = "FILE")]
	pub config_b: Option<PathBuf>,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	/// Overrides `corpus.path` of every config.
	#[arg(long, value_name = "FILE")]
	pub corpus: Option<PathBuf>,
	#[arg(long, value_name = "N")]
	pub top_k: Option<u32>,
	#[arg(long, value_name = "N", default_value_t = 1)]
	pub runs_per_query: u32,
}

#[derive(Debug, Deserialize)]
pub struct EvalDataset {
	name: Option<String>,
	defaults: Option<EvalDefaults>,
	queries: Vec<EvalQuery>,
}

#[derive(Debug, Default, Deserialize, Clone)]
struct EvalDefaults {
	top_k: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EvalQuery {
	id: Option<String>,
	query: String,
	top_k: Option<u32>,
	expected_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	dataset: EvalDatasetInfo,
	settings: EvalSettings,
	summary: EvalSummary,
	queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
pub struct EvalDatasetInfo {
	pub name: String,
	pub query_count: usize,
}

#[derive(Debug, Serialize)]
pub struct EvalSettings {
	pub config_path: String,
	pub top_k: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub runs_per_query: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct EvalSummary {
	pub avg_recall_at_k: f64,
	pub avg_precision_at_k: f64,
	pub mean_rr: f64,
	pub mean_ndcg: f64,
	pub latency_ms_p50: f64,
	pub latency_ms_p95: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stability: Option<StabilitySummary>,
}

#[derive(Debug, Serialize)]
pub struct StabilitySummary {
	pub runs_per_query: u32,
	pub avg_positional_churn_at_k: f64,
	pub avg_set_churn_at_k: f64,
}

#[derive(Debug, Serialize)]
pub struct QueryReport {
	pub id: String,
	pub query: String,
	pub trace_id: Uuid,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub trace_ids: Option<Vec<Uuid>>,
	pub vector_used: bool,
	pub expected_count: usize,
	pub retrieved_count: usize,
	pub relevant_count: usize,
	pub recall_at_k: f64,
	pub precision_at_k: f64,
	pub rr: f64,
	pub ndcg: f64,
	pub latency_ms: f64,
	pub expected_urls: Vec<String>,
	pub retrieved_urls: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stability: Option<QueryStability>,
}

#[derive(Debug, Serialize, Clone, Copy)]
pub struct QueryStability {
	pub runs_per_query: u32,
	pub positional_churn_at_k: f64,
	pub set_churn_at_k: f64,
}

#[derive(Debug, Serialize)]
struct CompareOutput {
	dataset: EvalDatasetInfo,
	settings_a: EvalSettings,
	settings_b: EvalSettings,
	summary_a: EvalSummary,
	summary_b: EvalSummary,
	summary_delta: EvalSummaryDelta,
	policy_stability: PolicyStabilitySummary,
	queries: Vec<CompareQueryReport>,
}

#[derive(Debug, Serialize)]
struct PolicyStabilitySummary {
	k: u32,
	avg_positional_churn_at_k: f64,
	avg_set_churn_at_k: f64,
}

#[derive(Debug, Serialize)]
struct EvalSummaryDelta {
	avg_recall_at_k: f64,
	avg_precision_at_k: f64,
	mean_rr: f64,
	mean_ndcg: f64,
	latency_ms_p50: f64,
	latency_ms_p95: f64,
}

#[derive(Debug, Serialize)]
struct CompareQueryReport {
	id: String,
	query: String,
	expected_urls: Vec<String>,
	a: QueryVariantReport,
	b: QueryVariantReport,
	delta: QueryVariantDelta,
	policy_churn: PolicyChurn,
}

#[derive(Debug, Serialize)]
struct QueryVariantReport {
	trace_id: Uuid,
	vector_used: bool,
	relevant_count: usize,
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
	latency_ms: f64,
	retrieved_urls: Vec<String>,
}
impl From<&QueryReport> for QueryVariantReport {
	fn from(report: &QueryReport) -> Self {
		Self {
			trace_id: report.trace_id,
			vector_used: report.vector_used,
			relevant_count: report.relevant_count,
			recall_at_k: report.recall_at_k,
			precision_at_k: report.precision_at_k,
			rr: report.rr,
			ndcg: report.ndcg,
			latency_ms: report.latency_ms,
			retrieved_urls: report.retrieved_urls.clone(),
		}
	}
}

#[derive(Debug, Serialize)]
struct QueryVariantDelta {
	relevant_count: i64,
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
	latency_ms: f64,
}

#[derive(Debug, Serialize)]
struct PolicyChurn {
	positional_churn_at_k: f64,
	set_churn_at_k: f64,
}

struct MergedQuery {
	id: String,
	query: String,
	expected_urls: Vec<String>,
	request: RetrieveRequest,
}

#[derive(Debug)]
struct Metrics {
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
	relevant_count: usize,
}

pub struct EvalRun {
	pub dataset: EvalDatasetInfo,
	pub settings: EvalSettings,
	pub summary: EvalSummary,
	pub queries: Vec<QueryReport>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config_a = load_config(&args.config_a, args.corpus.as_deref())?;
	let filter = EnvFilter::try_new(&config_a.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let dataset = load_dataset(&args.dataset)?;
	let run_a = eval_config(&args.config_a, config_a, &dataset, &args).await?;

	if let Some(config_b_path) = &args.config_b {
		let config_b = load_config(config_b_path, args.corpus.as_deref())?;
		let run_b = eval_config(config_b_path, config_b, &dataset, &args).await?;
		let k = run_a.settings.top_k.min(run_b.settings.top_k).max(1);
		let (queries, policy_stability) = build_compare_queries(&run_a.queries, &run_b.queries, k);
		let summary_delta = diff_summary(&run_a.summary, &run_b.summary);
		let output = CompareOutput {
			dataset: run_a.dataset,
			settings_a: run_a.settings,
			settings_b: run_b.settings,
			summary_a: run_a.summary,
			summary_b: run_b.summary,
			summary_delta,
			policy_stability,
			queries,
		};
		let json = serde_json::to_string_pretty(&output)?;

		println!("{json}");

		return Ok(());
	}

	let output = EvalOutput {
		dataset: run_a.dataset,
		settings: run_a.settings,
		summary: run_a.summary,
		queries: run_a.queries,
	};
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

fn load_config(path: &Path, corpus: Option<&Path>) -> color_eyre::Result<Config> {
	let mut config = reef_config::load(path)?;

	if let Some(corpus) = corpus {
		config.corpus.path = Some(corpus.display().to_string());
	}

	Ok(config)
}

pub fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;

	parse_dataset(&raw)
}

pub fn parse_dataset(raw: &str) -> color_eyre::Result<EvalDataset> {
	let dataset: EvalDataset = serde_json::from_str(raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	Ok(dataset)
}

async fn eval_config(
	config_path: &Path,
	config: Config,
	dataset: &EvalDataset,
	args: &Args,
) -> color_eyre::Result<EvalRun> {
	let corpus_path = config
		.corpus
		.path
		.clone()
		.ok_or_else(|| eyre::eyre!("corpus.path is required for evaluation."))?;
	let documents = reef_domain::corpus::load_json(Path::new(&corpus_path))?;
	let service = ReefService::new(config, documents);

	evaluate(&service, &config_path.display().to_string(), dataset, args.top_k, args.runs_per_query)
		.await
}

/// Runs every dataset query against `service` and scores the ranked URLs.
pub async fn evaluate(
	service: &ReefService,
	config_path: &str,
	dataset: &EvalDataset,
	top_k: Option<u32>,
	runs_per_query: u32,
) -> color_eyre::Result<EvalRun> {
	let defaults = dataset.defaults.clone().unwrap_or_default();
	let runs_per_query = runs_per_query.max(1);

	let mut reports = Vec::with_capacity(dataset.queries.len());
	let mut latencies_ms = Vec::with_capacity(dataset.queries.len());
	let mut stability_positional = Vec::new();
	let mut stability_set = Vec::new();

	for (index, query) in dataset.queries.iter().enumerate() {
		let merged = merge_query(&defaults, query, top_k, &service.cfg, index)?;
		let expected: HashSet<&str> = merged.expected_urls.iter().map(String::as_str).collect();
		let (first, latency_ms, stability, trace_ids) =
			run_query_n_times(service, merged.request, runs_per_query).await?;
		let retrieved = retrieved_keys(&first);
		let metrics = compute_metrics(&retrieved, &expected);

		if let Some(s) = stability {
			stability_positional.push(s.positional_churn_at_k);
			stability_set.push(s.set_churn_at_k);
		}

		reports.push(QueryReport {
			id: merged.id,
			query: merged.query,
			trace_id: first.trace_id,
			trace_ids: (trace_ids.len() > 1).then_some(trace_ids),
			vector_used: first.vector_used,
			expected_count: expected.len(),
			retrieved_count: retrieved.len(),
			relevant_count: metrics.relevant_count,
			recall_at_k: metrics.recall_at_k,
			precision_at_k: metrics.precision_at_k,
			rr: metrics.rr,
			ndcg: metrics.ndcg,
			latency_ms,
			expected_urls: merged.expected_urls,
			retrieved_urls: retrieved,
			stability,
		});

		latencies_ms.push(latency_ms);
	}

	let mut summary = summarize(&reports, &latencies_ms);

	if runs_per_query > 1 && !stability_positional.is_empty() {
		let count = stability_positional.len() as f64;

		summary.stability = Some(StabilitySummary {
			runs_per_query,
			avg_positional_churn_at_k: stability_positional.iter().sum::<f64>() / count,
			avg_set_churn_at_k: stability_set.iter().sum::<f64>() / count,
		});
	}

	let settings = EvalSettings {
		config_path: config_path.to_string(),
		top_k: resolve_top_k(top_k.or(defaults.top_k), &service.cfg),
		runs_per_query: (runs_per_query > 1).then_some(runs_per_query),
	};

	tracing::info!(
		config_path,
		queries = reports.len(),
		mean_rr = summary.mean_rr,
		mean_ndcg = summary.mean_ndcg,
		"Evaluation finished."
	);

	Ok(EvalRun {
		dataset: EvalDatasetInfo {
			name: dataset.name.clone().unwrap_or_else(|| "eval".to_string()),
			query_count: reports.len(),
		},
		settings,
		summary,
		queries: reports,
	})
}

async fn run_query_n_times(
	service: &ReefService,
	request: RetrieveRequest,
	runs_per_query: u32,
) -> color_eyre::Result<(RetrieveResponse, f64, Option<QueryStability>, Vec<Uuid>)> {
	let k = request.top_k.unwrap_or(1).max(1) as usize;
	let runs = runs_per_query.max(1);

	let mut first_response: Option<RetrieveResponse> = None;
	let mut first_retrieved: Vec<String> = Vec::new();
	let mut trace_ids: Vec<Uuid> = Vec::with_capacity(runs as usize);
	let mut latency_total_ms = 0.0_f64;
	let mut positional_churn_sum = 0.0_f64;
	let mut set_churn_sum = 0.0_f64;
	let mut churn_count = 0u32;

	for run_idx in 0..runs {
		let start = Instant::now();
		let response = service.retrieve(request.clone()).await;
		let latency_ms = start.elapsed().as_secs_f64() * 1_000.0;

		latency_total_ms += latency_ms;
		trace_ids.push(response.trace_id);

		let retrieved = retrieved_keys(&response);

		if run_idx == 0 {
			first_retrieved = retrieved;
			first_response = Some(response);

			continue;
		}

		let (positional_churn_at_k, set_churn_at_k) =
			churn_against_baseline_at_k(&first_retrieved, &retrieved, k);

		positional_churn_sum += positional_churn_at_k;
		set_churn_sum += set_churn_at_k;
		churn_count += 1;
	}

	let latency_ms_mean = latency_total_ms / runs as f64;
	let stability = (churn_count > 0).then(|| QueryStability {
		runs_per_query: runs,
		positional_churn_at_k: positional_churn_sum / churn_count as f64,
		set_churn_at_k: set_churn_sum / churn_count as f64,
	});

	Ok((
		first_response.ok_or_else(|| eyre::eyre!("No retrieve responses were collected."))?,
		latency_ms_mean,
		stability,
		trace_ids,
	))
}

/// Ranked document keys, which equal the URL whenever the document has one.
fn retrieved_keys(response: &RetrieveResponse) -> Vec<String> {
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for item in &response.items {
		if seen.insert(item.document_key.as_str()) {
			out.push(item.document_key.clone());
		}
	}

	out
}

fn churn_against_baseline_at_k(baseline: &[String], other: &[String], k: usize) -> (f64, f64) {
	let k = k.max(1);

	let mut positional_diff = 0usize;

	for idx in 0..k {
		if baseline.get(idx) != other.get(idx) {
			positional_diff += 1;
		}
	}

	let positional_churn = positional_diff as f64 / k as f64;
	let base_set: HashSet<&String> = baseline.iter().take(k).collect();
	let other_set: HashSet<&String> = other.iter().take(k).collect();
	let overlap = base_set.intersection(&other_set).count();
	let set_churn = 1.0 - (overlap as f64 / k as f64);

	(positional_churn, set_churn)
}

fn diff_summary(a: &EvalSummary, b: &EvalSummary) -> EvalSummaryDelta {
	EvalSummaryDelta {
		avg_recall_at_k: b.avg_recall_at_k - a.avg_recall_at_k,
		avg_precision_at_k: b.avg_precision_at_k - a.avg_precision_at_k,
		mean_rr: b.mean_rr - a.mean_rr,
		mean_ndcg: b.mean_ndcg - a.mean_ndcg,
		latency_ms_p50: b.latency_ms_p50 - a.latency_ms_p50,
		latency_ms_p95: b.latency_ms_p95 - a.latency_ms_p95,
	}
}

fn build_compare_queries(
	a: &[QueryReport],
	b: &[QueryReport],
	k: u32,
) -> (Vec<CompareQueryReport>, PolicyStabilitySummary) {
	let k_usize = k.max(1) as usize;

	let mut positional_sum = 0.0_f64;
	let mut set_sum = 0.0_f64;
	let queries: Vec<CompareQueryReport> = a
		.iter()
		.zip(b.iter())
		.map(|(qa, qb)| {
			let (positional_churn_at_k, set_churn_at_k) =
				churn_against_baseline_at_k(&qa.retrieved_urls, &qb.retrieved_urls, k_usize);

			positional_sum += positional_churn_at_k;
			set_sum += set_churn_at_k;

			CompareQueryReport {
				id: qa.id.clone(),
				query: qa.query.clone(),
				expected_urls: qa.expected_urls.clone(),
				a: QueryVariantReport::from(qa),
				b: QueryVariantReport::from(qb),
				delta: QueryVariantDelta {
					relevant_count: qb.relevant_count as i64 - qa.relevant_count as i64,
					recall_at_k: qb.recall_at_k - qa.recall_at_k,
					precision_at_k: qb.precision_at_k - qa.precision_at_k,
					rr: qb.rr - qa.rr,
					ndcg: qb.ndcg - qa.ndcg,
					latency_ms: qb.latency_ms - qa.latency_ms,
				},
				policy_churn: PolicyChurn { positional_churn_at_k, set_churn_at_k },
			}
		})
		.collect();
	let count = queries.len().max(1) as f64;
	let summary = PolicyStabilitySummary {
		k,
		avg_positional_churn_at_k: positional_sum / count,
		avg_set_churn_at_k: set_sum / count,
	};

	(queries, summary)
}

fn resolve_top_k(requested: Option<u32>, cfg: &Config) -> u32 {
	requested.unwrap_or(cfg.retrieval.default_top_k).clamp(1, cfg.retrieval.max_top_k.max(1))
}

fn merge_query(
	defaults: &EvalDefaults,
	query: &EvalQuery,
	top_k: Option<u32>,
	cfg: &Config,
	index: usize,
) -> color_eyre::Result<MergedQuery> {
	let expected_urls: Vec<String> = query
		.expected_urls
		.iter()
		.map(|url| url.trim())
		.filter(|url| !url.is_empty())
		.map(str::to_string)
		.collect();

	if expected_urls.is_empty() {
		return Err(eyre::eyre!("Query at index {index} must include at least one expected_url."));
	}

	let top_k = resolve_top_k(top_k.or(query.top_k).or(defaults.top_k), cfg);
	let id = query.id.clone().unwrap_or_else(|| format!("query-{index}"));

	Ok(MergedQuery {
		id,
		query: query.query.clone(),
		expected_urls,
		request: RetrieveRequest { query: query.query.clone(), top_k: Some(top_k) },
	})
}

fn compute_metrics(retrieved: &[String], expected: &HashSet<&str>) -> Metrics {
	let expected_count = expected.len();

	let mut relevant_count = 0usize;
	let mut dcg = 0.0_f64;
	let mut first_hit: Option<usize> = None;

	for (idx, key) in retrieved.iter().enumerate() {
		if expected.contains(key.as_str()) {
			let rank = idx + 1;

			relevant_count += 1;
			dcg += 1.0 / (rank as f64 + 1.0).log2();

			if first_hit.is_none() {
				first_hit = Some(rank);
			}
		}
	}

	let rr = first_hit.map(|rank| 1.0 / rank as f64).unwrap_or(0.0);
	let ideal_hits = expected_count.min(retrieved.len());
	let idcg: f64 = (1..=ideal_hits).map(|rank| 1.0 / (rank as f64 + 1.0).log2()).sum();
	let ndcg = if idcg > 0.0 { dcg / idcg } else { 0.0 };
	let precision_at_k =
		if retrieved.is_empty() { 0.0 } else { relevant_count as f64 / retrieved.len() as f64 };
	let recall_at_k =
		if expected_count == 0 { 0.0 } else { relevant_count as f64 / expected_count as f64 };

	Metrics { recall_at_k, precision_at_k, rr, ndcg, relevant_count }
}

fn summarize(reports: &[QueryReport], latencies_ms: &[f64]) -> EvalSummary {
	let count = reports.len().max(1) as f64;
	let avg_recall_at_k = reports.iter().map(|r| r.recall_at_k).sum::<f64>() / count;
	let avg_precision_at_k = reports.iter().map(|r| r.precision_at_k).sum::<f64>() / count;
	let mean_rr = reports.iter().map(|r| r.rr).sum::<f64>() / count;
	let mean_ndcg = reports.iter().map(|r| r.ndcg).sum::<f64>() / count;

	let mut sorted = latencies_ms.to_vec();

	sorted.sort_by(f64::total_cmp);

	EvalSummary {
		avg_recall_at_k,
		avg_precision_at_k,
		mean_rr,
		mean_ndcg,
		latency_ms_p50: percentile(&sorted, 0.50),
		latency_ms_p95: percentile(&sorted, 0.95),
		stability: None,
	}
}

/// Linear interpolation between closest ranks of an ascending slice.
fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let clamped = percentile.clamp(0.0, 1.0);
	let pos = clamped * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}
