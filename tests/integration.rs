//! Integration tests for the expenditure query engine
//!
//! Loads datasets from files on disk and runs the three query modes end to end.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tempfile::TempDir;

use painel_despesas::data::options;
use painel_despesas::{
    columns, explore, load_file, variation, weight, CellValue, DatasetLoadError, Error,
    ExplorationFilter, JanelaTemporal, LoadOptions, OutlierComparison, QueryOutcome, ThresholdQuery,
};

const HEADER: &str = ";MUNICIPIO;UNIDADE;CODIGO;DESCRICAO;COMPETENCIA;VALOR_LIQUIDADO_MES;\
VARIACAO_PERCENTUAL_MENSAL;VARIACAO_ABSOLUTA_MENSAL;VARIACAO_PERCENTUAL_MENSAL_OUTLIER_SCORE;\
PERCENTUAL_DESPESA_CODIGO_MENSAL;PERCENTUAL_DESPESA_CODIGO_MENSAL_OUTLIER_SCORE";

const ROWS: &[&str] = &[
    "0;Aurora;Saude;0100;Pessoal;202401;2500000;5.0;2000000;3;40.0;2",
    "1;Aurora;Saude;200;Material;202401;800000;10.0;500000;5;10.0;6",
    "2;Aurora;Obras;0100;Pessoal;202401;1200000;12.5;1500000;4;55.0;4",
    "3;Aurora;Saude;0100;Pessoal;202402;2600000;4.0;100000;1;41.0;1",
    "4;Boa Vista;Saude;300;Servicos;202401;3000000;12.5;3000000;4;70.0;9",
    "5;Boa Vista;Saude;200;Material;202402;900000;-3.0;-30000;2;;",
];

/// Helper to write a semicolon-delimited dataset file
fn write_dataset(dir: &TempDir, name: &str, header: &str, rows: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("Failed to create dataset file");
    writeln!(file, "{header}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    path
}

fn setup() -> (TempDir, painel_despesas::Dataset) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let path = write_dataset(&tmp, "resultados.csv", HEADER, ROWS);
    let ds = load_file(&path, &LoadOptions::default()).expect("Failed to load dataset");
    (tmp, ds)
}

fn codes(outcome: &QueryOutcome<painel_despesas::MetricResult<'_>>) -> Vec<(String, String)> {
    match outcome {
        QueryOutcome::Rows(r) => r
            .rows
            .column(columns::CODIGO)
            .into_iter()
            .zip(r.rows.column(columns::MUNICIPIO))
            .map(|(c, m)| (c.to_string(), m.to_string()))
            .collect(),
        QueryOutcome::NoResults => Vec::new(),
    }
}

fn row_count(outcome: &QueryOutcome<painel_despesas::MetricResult<'_>>) -> usize {
    match outcome {
        QueryOutcome::Rows(r) => r.rows.len(),
        QueryOutcome::NoResults => 0,
    }
}

// =============================================================================
// Loader Tests
// =============================================================================

#[test]
fn test_load_drops_index_and_keeps_identifiers_as_text() {
    let (_tmp, ds) = setup();
    assert_eq!(ds.len(), 6);
    assert_eq!(ds.column_names()[0], "MUNICIPIO");
    assert_eq!(ds.text(0, columns::CODIGO), Some("0100"));
    assert_eq!(ds.text(0, columns::COMPETENCIA), Some("202401"));
    assert_eq!(
        ds.value(0, columns::VALOR_LIQUIDADO_MES),
        Some(&CellValue::Integer(2_500_000))
    );
    assert_eq!(
        ds.value(5, "PERCENTUAL_DESPESA_CODIGO_MENSAL"),
        Some(&CellValue::Null)
    );
}

#[test]
fn test_load_empty_identifier_cell_is_null() {
    let tmp = TempDir::new().unwrap();
    let path = write_dataset(
        &tmp,
        "resultados.csv",
        "CODIGO;COMPETENCIA;VALOR_LIQUIDADO_MES",
        &[";202401;10", "0100;;20"],
    );
    let ds = load_file(&path, &LoadOptions::default()).unwrap();
    assert_eq!(ds.value(0, columns::CODIGO), Some(&CellValue::Null));
    assert_eq!(ds.value(1, columns::COMPETENCIA), Some(&CellValue::Null));
    assert_eq!(ds.text(1, columns::CODIGO), Some("0100"));

    // A null code never matches a text filter, not even "nan".
    let filter = ExplorationFilter {
        codigo: Some("nan".into()),
        ..Default::default()
    };
    assert!(explore(&ds, &filter).is_empty());
}

#[test]
fn test_load_missing_file() {
    let tmp = TempDir::new().unwrap();
    let err = load_file(&tmp.path().join("resultados.csv"), &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, Error::DatasetLoad(DatasetLoadError::NotFound { .. })));
    assert!(err.is_fatal());
}

#[test]
fn test_load_empty_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("resultados.csv");
    std::fs::write(&path, "").unwrap();
    let err = load_file(&path, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, Error::DatasetLoad(DatasetLoadError::Empty { .. })));
    assert_eq!(err.user_message(), "O arquivo 'resultados.csv' está vazio.");
}

#[test]
fn test_load_ragged_rows_fail_to_parse() {
    let tmp = TempDir::new().unwrap();
    let path = write_dataset(&tmp, "resultados.csv", "A;B;C", &["1;2;3", "4;5"]);
    let err = load_file(&path, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, Error::DatasetLoad(DatasetLoadError::Parse { .. })));
}

#[test]
fn test_load_unsupported_extension() {
    let tmp = TempDir::new().unwrap();
    let path = write_dataset(&tmp, "resultados.xlsx", "A", &["1"]);
    let err = load_file(&path, &LoadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::DatasetLoad(DatasetLoadError::UnsupportedFormat { extension }) if extension == "xlsx"
    ));
}

#[test]
fn test_load_json_records() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("resultados.json");
    std::fs::write(
        &path,
        r#"[{"CODIGO": 100, "COMPETENCIA": 202401, "VALOR_LIQUIDADO_MES": 10.5},
            {"CODIGO": 200, "COMPETENCIA": 202402, "VALOR_LIQUIDADO_MES": null}]"#,
    )
    .unwrap();
    let ds = load_file(&path, &LoadOptions::default()).unwrap();
    assert_eq!(ds.len(), 2);
    assert_eq!(ds.text(0, columns::CODIGO), Some("100"));
    assert_eq!(ds.text(1, columns::COMPETENCIA), Some("202402"));
    assert_eq!(ds.value(1, columns::VALOR_LIQUIDADO_MES), Some(&CellValue::Null));
}

#[test]
fn test_load_parquet() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("resultados.parquet");
    let schema = Arc::new(Schema::new(vec![
        Field::new("CODIGO", DataType::Int64, false),
        Field::new("COMPETENCIA", DataType::Utf8, false),
        Field::new("VALOR_LIQUIDADO_MES", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![100, 200])),
            Arc::new(StringArray::from(vec!["2024-01", "2024-02"])),
            Arc::new(Float64Array::from(vec![Some(1.5), None])),
        ],
    )
    .unwrap();
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let ds = load_file(&path, &LoadOptions::default()).unwrap();
    assert_eq!(ds.text(1, columns::CODIGO), Some("200"));
    assert_eq!(ds.value(0, columns::VALOR_LIQUIDADO_MES), Some(&CellValue::Float(1.5)));
    assert_eq!(ds.value(1, columns::VALOR_LIQUIDADO_MES), Some(&CellValue::Null));
}

// =============================================================================
// Exploration Tests
// =============================================================================

#[test]
fn test_explore_without_filters_returns_everything_in_order() {
    let (_tmp, ds) = setup();
    let exploration = explore(&ds, &ExplorationFilter::default()).rows().unwrap();
    assert_eq!(exploration.rows.indices(), &[0, 1, 2, 3, 4, 5]);
    let records: Vec<_> = exploration.rows.records().cloned().collect();
    assert_eq!(records, ds.records().to_vec());
}

#[test]
fn test_explore_is_sound_and_complete() {
    let (_tmp, ds) = setup();
    let filter = ExplorationFilter {
        municipio: Some("Aurora".into()),
        codigo: Some("0100".into()),
        competencia: Some("202401".into()),
        ..Default::default()
    };
    let exploration = explore(&ds, &filter).rows().unwrap();
    let expected: Vec<usize> = (0..ds.len())
        .filter(|&i| {
            ds.text(i, columns::MUNICIPIO) == Some("Aurora")
                && ds.text(i, columns::CODIGO) == Some("0100")
                && ds.text(i, columns::COMPETENCIA) == Some("202401")
        })
        .collect();
    assert_eq!(exploration.rows.indices(), expected.as_slice());
    assert_eq!(expected, vec![0, 2]);
}

#[test]
fn test_explore_codigo_compared_as_text() {
    let (_tmp, ds) = setup();
    let filter = ExplorationFilter {
        codigo: Some("100".into()),
        ..Default::default()
    };
    assert!(explore(&ds, &filter).is_empty());
}

#[test]
fn test_explore_series_sums_filtered_rows() {
    let (_tmp, ds) = setup();
    let filter = ExplorationFilter {
        unidade: Some("Saude".into()),
        ..Default::default()
    };
    let exploration = explore(&ds, &filter).rows().unwrap();
    let series: Vec<(String, f64)> = exploration
        .series
        .iter()
        .map(|p| (p.competencia.clone(), p.valor_liquidado))
        .collect();
    assert_eq!(
        series,
        vec![
            ("202401".to_string(), 2_500_000.0 + 800_000.0 + 3_000_000.0),
            ("202402".to_string(), 2_600_000.0 + 900_000.0),
        ]
    );
}

#[test]
fn test_explore_with_option_label() {
    let (_tmp, ds) = setup();
    let option = options::codigo_options(&ds, Some("Aurora"), Some("Saude"))
        .into_iter()
        .find(|o| o.codigo == "200")
        .unwrap();
    assert_eq!(option.label(), "200 - Material");
    let filter = ExplorationFilter {
        municipio: Some("Aurora".into()),
        unidade: Some("Saude".into()),
        codigo: Some(painel_despesas::CodigoOption::code_from_label(&option.label()).to_string()),
        competencia: None,
    };
    assert_eq!(explore(&ds, &filter).rows().unwrap().rows.indices(), &[1]);
}

// =============================================================================
// Variation / Weight Tests
// =============================================================================

#[test]
fn test_variation_worked_example() {
    let tmp = TempDir::new().unwrap();
    let path = write_dataset(
        &tmp,
        "resultados.csv",
        "CODIGO;COMPETENCIA;VARIACAO_PERCENTUAL_MENSAL;VARIACAO_ABSOLUTA_MENSAL;VARIACAO_PERCENTUAL_MENSAL_OUTLIER_SCORE",
        &["100;2024-01;5.0;2000000;3", "200;2024-01;10.0;500000;5"],
    );
    let ds = load_file(&path, &LoadOptions::default()).unwrap();
    let mut query = ThresholdQuery::new("2024-01");
    query.min_percentual = 0.0;
    query.min_absoluto = 1_000_000.0;
    query.outlier_score = 3;
    query.outlier_comparison = OutlierComparison::GreaterOrEqual;

    let result = variation(&ds, &query).unwrap().rows().unwrap();
    assert_eq!(result.rows.column(columns::CODIGO), vec![CellValue::from("100")]);
}

#[test]
fn test_variation_sorted_descending_with_stable_ties() {
    let (_tmp, ds) = setup();
    let mut query = ThresholdQuery::new("202401");
    query.min_absoluto = 0.0;
    let result = variation(&ds, &query).unwrap();
    // Rows 2 and 4 tie at 12.5 and keep dataset order.
    assert_eq!(
        codes(&result),
        vec![
            ("0100".to_string(), "Aurora".to_string()),
            ("300".to_string(), "Boa Vista".to_string()),
            ("200".to_string(), "Aurora".to_string()),
            ("0100".to_string(), "Aurora".to_string()),
        ]
    );
    let QueryOutcome::Rows(result) = result else { unreachable!() };
    let keys: Vec<f64> = result
        .rows
        .column("VARIACAO_PERCENTUAL_MENSAL")
        .iter()
        .filter_map(CellValue::as_f64)
        .collect();
    assert!(keys.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(result.rows.indices(), &[2, 4, 1, 0]);
}

#[test]
fn test_outlier_equal_never_exceeds_greater_or_equal() {
    let (_tmp, ds) = setup();
    for competencia in ["202401", "202402"] {
        for score in 1..=9u8 {
            let mut query = ThresholdQuery::new(competencia);
            query.min_percentual = -100.0;
            query.min_absoluto = -1_000_000.0;
            query.outlier_score = score;
            let gte = variation(&ds, &query).unwrap();
            query.outlier_comparison = OutlierComparison::Equal;
            let eq = variation(&ds, &query).unwrap();
            assert!(row_count(&eq) <= row_count(&gte), "score {score} at {competencia}");

            let eq = weight(&ds, &query).unwrap();
            query.outlier_comparison = OutlierComparison::GreaterOrEqual;
            let gte = weight(&ds, &query).unwrap();
            assert!(row_count(&eq) <= row_count(&gte), "score {score} at {competencia}");
        }
    }
}

#[test]
fn test_codigo_selection_only_limits_percentage_side() {
    let (_tmp, ds) = setup();
    let mut query = ThresholdQuery::new("202401");
    query.min_absoluto = 0.0;
    query.codigos = Some(BTreeSet::from(["300".to_string()]));
    let result = variation(&ds, &query).unwrap();
    assert_eq!(codes(&result), vec![("300".to_string(), "Boa Vista".to_string())]);
}

#[test]
fn test_variation_missing_annual_columns() {
    let (_tmp, ds) = setup();
    let mut query = ThresholdQuery::new("202401");
    query.janela = JanelaTemporal::Anual;
    match variation(&ds, &query) {
        Err(Error::MissingColumns { janela, columns }) => {
            assert_eq!(janela, JanelaTemporal::Anual);
            assert!(columns.contains(&"VARIACAO_PERCENTUAL_ANUAL".to_string()));
        }
        other => panic!("expected missing columns, got {other:?}"),
    }
}

#[test]
fn test_weight_monthly_uses_valor_liquidado_mes() {
    let (_tmp, ds) = setup();
    let mut query = ThresholdQuery::new("202401");
    query.min_absoluto = 1_000_000.0;
    let result = weight(&ds, &query).unwrap();
    // Row 1 has VALOR_LIQUIDADO_MES below the floor.
    assert_eq!(
        codes(&result),
        vec![
            ("300".to_string(), "Boa Vista".to_string()),
            ("0100".to_string(), "Aurora".to_string()),
            ("0100".to_string(), "Aurora".to_string()),
        ]
    );
    let QueryOutcome::Rows(result) = result else { unreachable!() };
    assert_eq!(result.columns.absoluto, "VALOR_LIQUIDADO_MES");
}

#[test]
fn test_weight_missing_annual_reference_column() {
    let tmp = TempDir::new().unwrap();
    let path = write_dataset(
        &tmp,
        "resultados.csv",
        "CODIGO;COMPETENCIA;PERCENTUAL_DESPESA_CODIGO_ANUAL;PERCENTUAL_DESPESA_CODIGO_ANUAL_OUTLIER_SCORE",
        &["100;2024-12;30.0;4"],
    );
    let ds = load_file(&path, &LoadOptions::default()).unwrap();
    let mut query = ThresholdQuery::new("2024-12");
    query.janela = JanelaTemporal::Anual;
    match weight(&ds, &query) {
        Err(Error::MissingColumns { janela, columns }) => {
            assert_eq!(janela, JanelaTemporal::Anual);
            assert_eq!(columns, vec!["VALOR_MEDIO_LIQUIDADO_ANO".to_string()]);
        }
        other => panic!("expected missing columns, got {other:?}"),
    }
}

#[test]
fn test_weight_dispatch_for_every_window() {
    let tmp = TempDir::new().unwrap();
    let mut header = vec!["CODIGO".to_string(), "COMPETENCIA".to_string()];
    let mut row = vec!["100".to_string(), "2024-06".to_string()];
    for janela in JanelaTemporal::ALL {
        header.push(format!("PERCENTUAL_DESPESA_CODIGO_{janela}"));
        header.push(format!("PERCENTUAL_DESPESA_CODIGO_{janela}_OUTLIER_SCORE"));
        row.push("25.0".into());
        row.push("5".into());
    }
    // Only the reference column of the window under test is large.
    let references = JanelaTemporal::ALL.map(JanelaTemporal::valor_referencia);
    header.extend(references.iter().map(|r| r.to_string()));

    for (i, janela) in JanelaTemporal::ALL.into_iter().enumerate() {
        let mut values = row.clone();
        values.extend((0..references.len()).map(|j| if i == j { "5000000" } else { "1" }.to_string()));
        let path = write_dataset(&tmp, &format!("peso_{janela}.csv"), &header.join(";"), &[values.join(";").as_str()]);
        let ds = load_file(&path, &LoadOptions::default()).unwrap();

        for other in JanelaTemporal::ALL {
            let mut query = ThresholdQuery::new("2024-06");
            query.janela = other;
            let found = !weight(&ds, &query).unwrap().is_empty();
            assert_eq!(found, other == janela, "data for {janela}, query {other}");
        }
    }
}
