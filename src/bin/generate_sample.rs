use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use painel_despesas::JanelaTemporal;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Outlier score skewed towards low values.
    fn score(&mut self) -> i64 {
        let u = self.next_f64();
        1 + (u * u * 9.0).floor().min(8.0) as i64
    }
}

/// Months in each window, used to average the monthly spending.
fn window_months(janela: JanelaTemporal) -> usize {
    match janela {
        JanelaTemporal::Mensal => 1,
        JanelaTemporal::Trimestral => 3,
        JanelaTemporal::Semestral => 6,
        JanelaTemporal::Anual => 12,
    }
}

/// Columns keyed by name, in output order.
struct Columns {
    text: Vec<(String, Vec<String>)>,
    float: Vec<(String, Vec<f64>)>,
    int: Vec<(String, Vec<i64>)>,
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let municipios = ["Aurora", "Boa Vista", "Campo Alegre"];
    let unidades = ["Secretaria de Saude", "Secretaria de Educacao", "Secretaria de Obras"];
    let codigos = [
        ("319011", "Vencimentos e Vantagens Fixas"),
        ("339030", "Material de Consumo"),
        ("339039", "Outros Servicos de Terceiros"),
        ("449051", "Obras e Instalacoes"),
    ];
    let competencias: Vec<String> = (1..=12).map(|m| format!("2024-{m:02}")).collect();

    let mut cols = Columns {
        text: ["MUNICIPIO", "UNIDADE", "CODIGO", "DESCRICAO", "COMPETENCIA"]
            .iter()
            .map(|n| (n.to_string(), Vec::new()))
            .collect(),
        float: vec![("VALOR_LIQUIDADO_MES".to_string(), Vec::new())],
        int: Vec::new(),
    };
    for janela in JanelaTemporal::ALL {
        let w = janela.as_str();
        cols.float.push((format!("VARIACAO_PERCENTUAL_{w}"), Vec::new()));
        cols.float.push((format!("VARIACAO_ABSOLUTA_{w}"), Vec::new()));
        cols.float.push((format!("PERCENTUAL_DESPESA_CODIGO_{w}"), Vec::new()));
        if janela != JanelaTemporal::Mensal {
            cols.float.push((janela.valor_referencia().to_string(), Vec::new()));
        }
        cols.int.push((format!("VARIACAO_PERCENTUAL_{w}_OUTLIER_SCORE"), Vec::new()));
        cols.int.push((format!("PERCENTUAL_DESPESA_CODIGO_{w}_OUTLIER_SCORE"), Vec::new()));
    }

    let mut n_rows = 0usize;
    for municipio in &municipios {
        for unidade in &unidades {
            // Monthly spending per code for this unit.
            let series: Vec<Vec<f64>> = codigos
                .iter()
                .map(|_| {
                    let base = rng.range(200_000.0, 8_000_000.0);
                    (0..competencias.len())
                        .map(|_| base * rng.range(0.6, 1.6))
                        .collect()
                })
                .collect();

            for (c, (codigo, descricao)) in codigos.iter().enumerate() {
                for (m, competencia) in competencias.iter().enumerate() {
                    let text = [*municipio, *unidade, *codigo, *descricao, competencia.as_str()];
                    for ((_, values), value) in cols.text.iter_mut().zip(text) {
                        values.push(value.to_string());
                    }

                    let mut floats = vec![series[c][m]];
                    let mut ints = Vec::new();
                    for janela in JanelaTemporal::ALL {
                        let months = window_months(janela);
                        let start = (m + 1).saturating_sub(months);
                        let mean = |s: &[f64]| s[start..=m].iter().sum::<f64>() / (m + 1 - start) as f64;
                        let prev_end = start.saturating_sub(1);
                        let prev_start = (prev_end + 1).saturating_sub(months);
                        let current = mean(series[c].as_slice());
                        let previous = series[c][prev_start..=prev_end].iter().sum::<f64>()
                            / (prev_end + 1 - prev_start) as f64;
                        let unit_total: f64 = series.iter().map(|s| mean(s.as_slice())).sum();

                        floats.push((current - previous) / previous * 100.0);
                        floats.push(current - previous);
                        floats.push(current / unit_total * 100.0);
                        if janela != JanelaTemporal::Mensal {
                            floats.push(current);
                        }
                        ints.push(rng.score());
                        ints.push(rng.score());
                    }
                    for ((_, values), value) in cols.float.iter_mut().zip(floats) {
                        values.push(value);
                    }
                    for ((_, values), value) in cols.int.iter_mut().zip(ints) {
                        values.push(value);
                    }
                    n_rows += 1;
                }
            }
        }
    }

    write_csv("resultados.csv", &cols, n_rows)?;
    write_parquet("resultados.parquet", &cols)?;

    println!("Wrote {n_rows} records to resultados.csv and resultados.parquet");
    Ok(())
}

/// Semicolon-delimited, with the unnamed index column pandas writes.
fn write_csv(path: &str, cols: &Columns, n_rows: usize) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .with_context(|| format!("creating {path}"))?;

    let mut header = vec![String::new()];
    header.extend(cols.text.iter().map(|(n, _)| n.clone()));
    header.extend(cols.float.iter().map(|(n, _)| n.clone()));
    header.extend(cols.int.iter().map(|(n, _)| n.clone()));
    writer.write_record(&header)?;

    for row in 0..n_rows {
        let mut record = vec![row.to_string()];
        record.extend(cols.text.iter().map(|(_, v)| v[row].clone()));
        record.extend(cols.float.iter().map(|(_, v)| format!("{:.2}", v[row])));
        record.extend(cols.int.iter().map(|(_, v)| v[row].to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &str, cols: &Columns) -> Result<()> {
    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();
    for (name, values) in &cols.text {
        fields.push(Field::new(name, DataType::Utf8, false));
        arrays.push(Arc::new(StringArray::from(values.clone())));
    }
    for (name, values) in &cols.float {
        fields.push(Field::new(name, DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from(values.clone())));
    }
    for (name, values) in &cols.int {
        fields.push(Field::new(name, DataType::Int64, false));
        arrays.push(Arc::new(Int64Array::from(values.clone())));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}
