//! Painel de despesas CLI – explore municipal expenditure records

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

use painel_despesas::data::options;
use painel_despesas::report;
use painel_despesas::{
    explore, load_file, variation, weight, CodigoOption, Dataset, Error, ExplorationFilter,
    JanelaTemporal, MetricResult, OutlierComparison, QueryOutcome, RowSet, Settings, ThresholdQuery,
};

#[derive(Parser)]
#[command(name = "painel-despesas")]
#[command(about = "Explore municipal expenditure records", long_about = None)]
struct Cli {
    /// Dataset file (overrides the settings file)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter records by municipio, unidade, codigo and competencia
    Explore {
        #[arg(long)]
        municipio: Option<String>,
        #[arg(long)]
        unidade: Option<String>,
        /// Expense code, or a "<codigo> - <descricao>" label
        #[arg(long)]
        codigo: Option<String>,
        #[arg(long)]
        competencia: Option<String>,
    },

    /// Variation of each expense code within a time window
    Variation(ThresholdArgs),

    /// Weight of each expense code within a time window
    Weight(ThresholdArgs),

    /// List the values available for each selection
    Options {
        #[arg(long)]
        municipio: Option<String>,
        #[arg(long)]
        unidade: Option<String>,
    },
}

#[derive(Args)]
struct ThresholdArgs {
    #[arg(long)]
    competencia: Option<String>,

    /// MENSAL, TRIMESTRAL, SEMESTRAL or ANUAL
    #[arg(long)]
    janela: Option<JanelaTemporal>,

    /// Minimum percentage metric
    #[arg(long)]
    min_percentual: Option<f64>,

    /// Minimum absolute metric
    #[arg(long)]
    min_absoluto: Option<f64>,

    /// Expense codes to keep (repeatable; default: all)
    #[arg(long = "codigo")]
    codigos: Vec<String>,

    /// Outlier score, 1 to 9
    #[arg(long)]
    outlier_score: Option<u8>,

    /// Match the outlier score exactly instead of "greater or equal"
    #[arg(long)]
    outlier_eq: bool,
}

impl ThresholdArgs {
    fn into_query(self, settings: &Settings) -> ThresholdQuery {
        let mut query = ThresholdQuery::with_defaults(self.competencia, &settings.defaults);
        if let Some(janela) = self.janela {
            query.janela = janela;
        }
        if let Some(min) = self.min_percentual {
            query.min_percentual = min;
        }
        if let Some(min) = self.min_absoluto {
            query.min_absoluto = min;
        }
        if !self.codigos.is_empty() {
            query.codigos = Some(self.codigos.into_iter().collect::<BTreeSet<_>>());
        }
        if let Some(score) = self.outlier_score {
            query.outlier_score = score;
        }
        if self.outlier_eq {
            query.outlier_comparison = OutlierComparison::Equal;
        }
        query
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("reading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(data) = cli.data {
        settings.dataset_path = data;
    }

    let dataset = load_file(&settings.dataset_path, &settings.load).map_err(report_error)?;
    let out = Output {
        format: cli.format,
        delimiter: u8::try_from(settings.load.delimiter).unwrap_or(b';'),
    };

    match cli.command {
        Commands::Explore {
            municipio,
            unidade,
            codigo,
            competencia,
        } => {
            let filter = ExplorationFilter {
                municipio,
                unidade,
                codigo: codigo.map(|c| CodigoOption::code_from_label(&c).to_string()),
                competencia,
            };
            run_explore(&dataset, &filter, &out)
        }
        Commands::Variation(args) => {
            let query = args.into_query(&settings);
            let outcome = variation(&dataset, &query).map_err(report_error)?;
            print_metric(outcome, "Resultados de Variações", &out)
        }
        Commands::Weight(args) => {
            let query = args.into_query(&settings);
            let outcome = weight(&dataset, &query).map_err(report_error)?;
            print_metric(outcome, "Resultados de Peso", &out)
        }
        Commands::Options { municipio, unidade } => {
            print_options(&dataset, municipio.as_deref(), unidade.as_deref());
            Ok(())
        }
    }
}

fn report_error(err: Error) -> anyhow::Error {
    log::error!("{err}");
    anyhow::anyhow!(err.user_message())
}

struct Output {
    format: Format,
    delimiter: u8,
}

impl Output {
    fn rows(&self, rows: &RowSet<'_>, columns: &[&str]) -> anyhow::Result<()> {
        match self.format {
            Format::Table => {
                let batch = report::rows_to_batch(rows, columns)?;
                println!("{}", report::format_table(&[batch])?);
            }
            Format::Csv => {
                report::write_delimited(rows, columns, self.delimiter, std::io::stdout().lock())?;
            }
        }
        Ok(())
    }
}

fn run_explore(dataset: &Dataset, filter: &ExplorationFilter, out: &Output) -> anyhow::Result<()> {
    let Some(exploration) = explore(dataset, filter).rows() else {
        println!("Nenhum resultado encontrado para os filtros aplicados.");
        return Ok(());
    };
    let columns: Vec<&str> = dataset.column_names().iter().map(String::as_str).collect();
    if matches!(out.format, Format::Table) {
        println!(
            "Resultados Filtrados: {} registros encontrados.",
            exploration.rows.len()
        );
    }
    out.rows(&exploration.rows, &columns)?;

    if matches!(out.format, Format::Table) {
        println!("Soma dos Valores Liquidados por Competência");
        let batch = report::series_to_batch(&exploration.series)?;
        println!("{}", report::format_table(&[batch])?);
    }
    Ok(())
}

fn print_metric(
    outcome: QueryOutcome<MetricResult<'_>>,
    title: &str,
    out: &Output,
) -> anyhow::Result<()> {
    let Some(result) = outcome.rows() else {
        println!("Nenhum resultado encontrado para os filtros aplicados.");
        return Ok(());
    };
    if matches!(out.format, Format::Table) {
        println!("{title}: {} registros encontrados.", result.rows.len());
    }
    out.rows(&result.rows, &result.output_columns())
}

fn print_options(dataset: &Dataset, municipio: Option<&str>, unidade: Option<&str>) {
    println!("Municípios:");
    for value in options::municipio_options(dataset) {
        println!("  {value}");
    }
    if municipio.is_some() {
        println!("Unidades:");
        for value in options::unidade_options(dataset, municipio) {
            println!("  {value}");
        }
    }
    if municipio.is_some() && unidade.is_some() {
        println!("Códigos:");
        for option in options::codigo_options(dataset, municipio, unidade) {
            println!("  {}", option.label());
        }
    }
    println!("Competências:");
    for value in options::competencia_options(dataset) {
        println!("  {value}");
    }
}
