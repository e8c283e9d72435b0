use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tempfile::TempDir;

use crate::cli::FlowKind;
use crate::commands::inventory::discover_candidates;
use crate::model::{FileOutcome, FileStatus, SummaryEntry};

use super::code::{DEFAULT_SECTOR, classify_sector, normalize_code};
use super::describe::{CleaningProfile, DescriptionCleaner, UNKNOWN_LABEL};
use super::flow::{Field, FlowConfig};
use super::header::locate_header;
use super::partition::{SUMMARY_FILE_NAME, SummaryIndex};
use super::period::PeriodParser;
use super::pipeline::{LogProgress, PipelineConfig, PipelineOrchestrator, ProgressObserver};
use super::records::parse_measure;
use super::schema::map_schema;
use super::text::normalize_text;
use super::workbook::SheetReader;

struct MemoryReader {
    sheets: HashMap<String, Vec<Vec<String>>>,
}

impl SheetReader for MemoryReader {
    fn read_rows(&self, path: &Path) -> Result<Vec<Vec<String>>> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .context("fixture path has no name")?;
        self.sheets
            .get(name)
            .cloned()
            .with_context(|| format!("corrupt workbook: {name}"))
    }
}

#[derive(Default)]
struct RecordingObserver {
    seen: Vec<(usize, usize, String)>,
}

impl ProgressObserver for RecordingObserver {
    fn file_finished(&mut self, index: usize, total: usize, outcome: &FileOutcome) {
        self.seen.push((index, total, outcome.file.clone()));
    }
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|cell| (*cell).to_string()).collect()
}

fn subheading_sheet(junk_rows: usize, data: &[[&str; 6]]) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for index in 0..junk_rows {
        if index % 2 == 0 {
            rows.push(row(&["Banco Central del Ecuador", "", ""]));
        } else {
            rows.push(Vec::new());
        }
    }
    rows.push(row(&[
        "Período",
        "Código Subpartida",
        "Subpartida",
        "FOB",
        "CIF",
        "TM",
    ]));
    for cells in data {
        rows.push(row(cells));
    }
    rows
}

struct Fixture {
    _dir: TempDir,
    source_dir: PathBuf,
    output_root: PathBuf,
}

impl Fixture {
    fn new(file_names: &[&str]) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let source_dir = dir.path().join("raw");
        let output_root = dir.path().join("public").join("data");
        fs::create_dir_all(&source_dir).expect("create source dir");
        for name in file_names {
            fs::write(source_dir.join(name), b"").expect("write fixture file");
        }
        Self {
            _dir: dir,
            source_dir,
            output_root,
        }
    }

    fn orchestrator(
        &self,
        sheets: Vec<(&str, Vec<Vec<String>>)>,
    ) -> PipelineOrchestrator<MemoryReader> {
        let reader = MemoryReader {
            sheets: sheets
                .into_iter()
                .map(|(name, rows)| (name.to_string(), rows))
                .collect(),
        };
        let config = PipelineConfig {
            source_dir: self.source_dir.clone(),
            output_root: self.output_root.clone(),
            header_scan_rows: 40,
            extension: "xlsx".to_string(),
        };
        PipelineOrchestrator::new(config, reader).expect("build orchestrator")
    }

    fn read_json(&self, subdir: &str, file: &str) -> serde_json::Value {
        let raw = fs::read(self.output_root.join(subdir).join(file)).expect("read output");
        serde_json::from_slice(&raw).expect("parse output")
    }
}

#[test]
fn normalize_text_folds_case_accents_and_whitespace() {
    assert_eq!(normalize_text("  Código   SUBPARTIDA "), "codigo subpartida");
    assert_eq!(normalize_text("Período"), "periodo");
    assert_eq!(normalize_text("Año\u{a0}Fiscal"), "ano fiscal");
    assert_eq!(normalize_text(""), "");
}

#[test]
fn locate_header_skips_leading_noise_up_to_bound() {
    let flow = FlowConfig::for_kind(FlowKind::Imports);
    for junk in 0..10 {
        let mut rows = (0..junk)
            .map(|index| row(&["Reporte", index.to_string().as_str()]))
            .collect::<Vec<Vec<String>>>();
        rows.push(row(&["FOB", "CODIGO SUBPARTIDA", "periodo"]));
        assert_eq!(locate_header(&rows, 10, &flow), Some(junk), "junk rows: {junk}");
    }

    let mut rows = (0..10).map(|_| row(&["Reporte"])).collect::<Vec<Vec<String>>>();
    rows.push(row(&["Período", "Código Subpartida"]));
    assert_eq!(locate_header(&rows, 10, &flow), None);
}

#[test]
fn locate_header_requires_both_anchors() {
    let flow = FlowConfig::for_kind(FlowKind::Exports);
    let rows = vec![
        row(&["Período", "Subpartida"]),
        row(&["Código Subpartida", "FOB"]),
    ];
    assert_eq!(locate_header(&rows, 40, &flow), None);
}

#[test]
fn locate_header_uses_end_use_anchors() {
    let flow = FlowConfig::for_kind(FlowKind::EndUse);
    let rows = vec![row(&["CUODE 2022"]), row(&["AÑO", "Código CUODE", "Valor CIF"])];
    assert_eq!(locate_header(&rows, 40, &flow), Some(1));
}

#[test]
fn map_schema_resolves_accent_variants_and_leaves_unknown_fields_out() {
    let flow = FlowConfig::for_kind(FlowKind::Exports);
    let labels = row(&["PERIODO", "codigo subpartida", "Descripcion", " FOB ", "Peso Neto"]);
    let schema = map_schema(&labels, flow.columns);

    assert_eq!(schema.get(Field::Period).map(|b| b.index), Some(0));
    assert_eq!(schema.get(Field::Code).map(|b| b.index), Some(1));
    assert_eq!(schema.get(Field::Description).map(|b| b.label.as_str()), Some("Descripcion"));
    assert_eq!(schema.get(Field::Fob).map(|b| b.label.as_str()), Some("FOB"));
    assert_eq!(schema.get(Field::Weight).map(|b| b.index), Some(4));
    assert!(schema.get(Field::Cif).is_none());
    assert!(schema.missing(flow.required).is_empty());
}

#[test]
fn map_schema_prefers_earlier_spelling() {
    let flow = FlowConfig::for_kind(FlowKind::Imports);
    let labels = row(&["Peso", "TM (Peso Neto)", "Período", "Código Subpartida"]);
    let schema = map_schema(&labels, flow.columns);
    assert_eq!(schema.get(Field::Weight).map(|b| b.index), Some(1));
}

#[test]
fn parse_period_follows_precedence() {
    let parser = PeriodParser::new().expect("period parser");
    let date = |y, m| NaiveDate::from_ymd_opt(y, m, 1);

    assert_eq!(parser.parse("2020 / 03 - March"), date(2020, 3));
    assert_eq!(parser.parse("2021/1"), date(2021, 1));
    assert_eq!(parser.parse("2020"), date(2020, 1));
    assert_eq!(parser.parse("2019.0"), date(2019, 1));
    assert_eq!(parser.parse("not a date"), None);
    assert_eq!(parser.parse(""), None);
    assert_eq!(parser.parse("Informe 1999 corte 2020 / 11 - Nov"), date(2020, 11));
}

#[test]
fn parse_period_rejects_invalid_month() {
    let parser = PeriodParser::new().expect("period parser");
    assert_eq!(parser.parse("2020 / 13"), None);
    assert_eq!(parser.parse("2020 / 00 - Cero"), None);
}

#[test]
fn normalize_code_pads_to_fixed_width() {
    assert_eq!(normalize_code("12.34.0"), "0000001234");
    assert_eq!(normalize_code("0302.11"), "0302110000");
    assert_eq!(normalize_code(" 0302.11.00.00 "), "0302110000");
    assert_eq!(normalize_code("8471300000.0"), "8471300000");
    assert_eq!(normalize_code("123456789012"), "123456789012");
    assert_eq!(normalize_code("ABC.1"), "ABC1");
    assert_eq!(normalize_code("110"), "0000000110");
    assert_eq!(normalize_code("12 .0"), "0000000012");
    assert_eq!(normalize_code("ABC .0"), "ABC");
}

#[test]
fn normalize_code_is_idempotent() {
    let inputs = [
        "12.34.0", "0302.11", "8703.23.90.90", "1.0", ".0", "", "  7 ", "ABC.0", "X-12",
        "99999999999", "5.0.0", "12 .0", "ABC .0", "0302 .11",
    ];
    for input in inputs {
        let once = normalize_code(input);
        assert_eq!(normalize_code(&once), once, "input: {input:?}");
    }
}

#[test]
fn classify_sector_is_total() {
    assert_eq!(classify_sector("0302110000"), "🦐 Pesca y Crustáceos");
    assert_eq!(classify_sector("8703239090"), "🚗 Vehículos");
    assert_eq!(classify_sector("9999999999"), DEFAULT_SECTOR);
    assert_eq!(classify_sector("0000000110"), DEFAULT_SECTOR);
    assert_eq!(classify_sector(""), DEFAULT_SECTOR);
    assert_eq!(classify_sector("A"), DEFAULT_SECTOR);
}

#[test]
fn aggressive_cleaning_strips_boilerplate_and_recases() {
    let cleaner = DescriptionCleaner::new().expect("cleaner");
    let clean = |raw| cleaner.clean(raw, CleaningProfile::Aggressive);

    assert_eq!(clean("LOS DEMÁS SALMONES (FRESCOS)"), "Salmones");
    assert_eq!(clean("las demas: filetes de pescado"), "Filetes de pescado");
    assert_eq!(clean("OTROS OTRAS BANANAS"), "Bananas");
    assert_eq!(clean("OTROSIDOS"), "Otrosidos");
    assert_eq!(clean("Camarones (congelados"), "Camarones");
    assert_eq!(clean("LOS DEMÁS"), UNKNOWN_LABEL);
    assert_eq!(clean("   "), UNKNOWN_LABEL);
}

#[test]
fn light_cleaning_keeps_casing() {
    let cleaner = DescriptionCleaner::new().expect("cleaner");
    let clean = |raw| cleaner.clean(raw, CleaningProfile::Light);

    assert_eq!(clean("Bienes de CAPITAL  (excepto transporte)"), "Bienes de CAPITAL");
    assert_eq!(clean("Combustibles"), "Combustibles");
    assert_eq!(clean("(sin descripción)"), UNKNOWN_LABEL);
    assert_eq!(clean(""), UNKNOWN_LABEL);
}

#[test]
fn parse_measure_coerces_garbage_to_zero() {
    assert_eq!(parse_measure(" 12.5 "), 12.5);
    assert_eq!(parse_measure("1000"), 1000.0);
    assert_eq!(parse_measure("1.234,56"), 0.0);
    assert_eq!(parse_measure("n/a"), 0.0);
    assert_eq!(parse_measure("NaN"), 0.0);
    assert_eq!(parse_measure(""), 0.0);
}

#[test]
fn discovery_skips_lock_files_and_filters_by_flow_token() {
    let fixture = Fixture::new(&[
        "2020-import-subpartidas.xlsx",
        "2020-EXPORT-subpartidas.xlsx",
        "exportadores-import.xlsx",
        "~$2020-import-subpartidas.xlsx",
        "notes.txt",
    ]);

    let imports = discover_candidates(
        &fixture.source_dir,
        "xlsx",
        FlowConfig::for_kind(FlowKind::Imports).filter,
    )
    .expect("discover imports");
    let names = imports
        .iter()
        .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
        .collect::<Vec<&str>>();
    assert_eq!(
        names,
        vec!["2020-import-subpartidas.xlsx", "exportadores-import.xlsx"]
    );

    let exports = discover_candidates(
        &fixture.source_dir,
        "xlsx",
        FlowConfig::for_kind(FlowKind::Exports).filter,
    )
    .expect("discover exports");
    assert_eq!(exports.len(), 1);
    assert!(exports[0].ends_with("2020-EXPORT-subpartidas.xlsx"));
}

#[test]
fn import_scenario_writes_year_file_and_summary() {
    let name = "2021-import-subpartidas.xlsx";
    let fixture = Fixture::new(&[name]);
    let sheet = subheading_sheet(
        7,
        &[[
            "2021 / 01 - Enero",
            "0302.11",
            "LOS DEMÁS SALMONES (FRESCOS)",
            "1000",
            "1200",
            "5",
        ]],
    );
    let orchestrator = fixture.orchestrator(vec![(name, sheet)]);

    let report = orchestrator
        .run(&FlowConfig::for_kind(FlowKind::Imports), &mut LogProgress)
        .expect("run imports");
    assert!(report.success);
    assert_eq!(report.processed_count, 1);
    assert_eq!(report.years_written, vec!["2021"]);

    let raw = fs::read_to_string(fixture.output_root.join("imports").join("2021.json"))
        .expect("read year file");
    assert_eq!(
        raw,
        r#"[{"date":"2021-01-01","code":"0302110000","label":"Salmones","sector":"🦐 Pesca y Crustáceos","value_fob":1000.0,"value_cif":1200.0,"weight":5.0}]"#
    );

    let summary = fixture.read_json("imports", SUMMARY_FILE_NAME);
    assert_eq!(
        summary,
        serde_json::json!([
            {"year": "2021", "total": 1200.0, "record_count": 1, "file": "2021.json"}
        ])
    );
}

#[test]
fn exports_total_uses_fob_and_drops_rows_without_period() {
    let name = "2022-export-china-subpartidas.xlsx";
    let fixture = Fixture::new(&[name]);
    let sheet = subheading_sheet(
        0,
        &[
            ["2022 / 02 - Febrero", "0803.90.11.00", "BANANAS", "10.25", "99", "1"],
            ["2022 / 03 - Marzo", "1801.00.19.00", "CACAO EN GRANO", "5", "abc", "2"],
            ["TOTAL", "", "", "15.25", "99", "3"],
        ],
    );
    let orchestrator = fixture.orchestrator(vec![(name, sheet)]);

    let report = orchestrator
        .run(&FlowConfig::for_kind(FlowKind::Exports), &mut LogProgress)
        .expect("run exports");
    match &report.outcomes[0].status {
        FileStatus::Processed {
            records,
            dropped_rows,
            years,
        } => {
            assert_eq!(*records, 2);
            assert_eq!(*dropped_rows, 1);
            assert_eq!(years, &vec!["2022".to_string()]);
        }
        other => panic!("unexpected status: {other:?}"),
    }

    let data = fixture.read_json("exports", "2022.json");
    assert_eq!(data[1]["value_cif"], serde_json::json!(0.0));
    assert_eq!(data[0]["sector"], serde_json::json!("🍌 Banano y Frutas"));

    let summary = fixture.read_json("exports", SUMMARY_FILE_NAME);
    assert_eq!(summary[0]["total"], serde_json::json!(15.25));
}

#[test]
fn rerun_replaces_summary_entry_instead_of_duplicating() {
    let name = "2021-import-subpartidas.xlsx";
    let fixture = Fixture::new(&[name]);
    let flow = FlowConfig::for_kind(FlowKind::Imports);

    let first = subheading_sheet(2, &[["2021 / 01", "0302.11", "SALMONES", "1", "100", "1"]]);
    fixture
        .orchestrator(vec![(name, first)])
        .run(&flow, &mut LogProgress)
        .expect("first run");

    let second = subheading_sheet(
        2,
        &[
            ["2021 / 01", "0302.11", "SALMONES", "1", "40", "1"],
            ["2021 / 02", "0302.11", "SALMONES", "1", "2.5", "1"],
        ],
    );
    fixture
        .orchestrator(vec![(name, second)])
        .run(&flow, &mut LogProgress)
        .expect("second run");

    let summary = fixture.read_json("imports", SUMMARY_FILE_NAME);
    let entries = summary.as_array().expect("summary array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["total"], serde_json::json!(42.5));
    assert_eq!(entries[0]["record_count"], serde_json::json!(2));

    let data = fixture.read_json("imports", "2021.json");
    assert_eq!(data.as_array().map(Vec::len), Some(2));
}

#[test]
fn malformed_file_is_isolated_from_the_batch() {
    let names = [
        "2019-import-subpartidas.xlsx",
        "2020-import-subpartidas.xlsx",
        "2021-import-subpartidas.xlsx",
    ];
    let fixture = Fixture::new(&names);
    let malformed = vec![
        row(&["Período", "Subpartida", "FOB"]),
        row(&["2020 / 01", "AUTOS", "10"]),
    ];

    let orchestrator = fixture.orchestrator(vec![
        (
            names[0],
            subheading_sheet(1, &[["2019 / 05", "8703.23", "AUTOS", "1", "10", "1"]]),
        ),
        (names[1], malformed),
        (
            names[2],
            subheading_sheet(1, &[["2021 / 05", "8703.23", "AUTOS", "1", "30", "1"]]),
        ),
    ]);
    let mut observer = RecordingObserver::default();
    let report = orchestrator
        .run(&FlowConfig::for_kind(FlowKind::Imports), &mut observer)
        .expect("run imports");

    assert!(report.success);
    assert_eq!(report.processed_count, 2);
    assert_eq!(observer.seen.len(), 3);
    assert_eq!(observer.seen[1], (1, 3, names[1].to_string()));
    assert!(matches!(report.outcomes[1].status, FileStatus::Skipped { .. }));
    assert!(!fixture.output_root.join("imports").join("2020.json").exists());

    let summary = fixture.read_json("imports", SUMMARY_FILE_NAME);
    let years = summary
        .as_array()
        .expect("summary array")
        .iter()
        .map(|entry| entry["year"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<String>>();
    assert_eq!(years, vec!["2021", "2019"]);
}

#[test]
fn missing_required_columns_reports_found_columns() {
    let name = "2020-import-subpartidas.xlsx";
    let fixture = Fixture::new(&[name]);
    let mut flow = FlowConfig::for_kind(FlowKind::Imports);
    flow.required = &[Field::Period, Field::Code, Field::Cif];
    let sheet = vec![
        row(&["Período", "Código Subpartida", "FOB", ""]),
        row(&["2020 / 01", "0302.11", "10", ""]),
    ];
    let report = fixture
        .orchestrator(vec![(name, sheet)])
        .run(&flow, &mut LogProgress)
        .expect("run");

    assert!(!report.success);
    assert_eq!(
        report.outcomes[0].status,
        FileStatus::Skipped {
            reason: "missing required columns: cif".to_string(),
            found_columns: vec![
                "Período".to_string(),
                "Código Subpartida".to_string(),
                "FOB".to_string()
            ],
        }
    );
    assert!(!fixture.output_root.join("imports").join(SUMMARY_FILE_NAME).exists());
}

#[test]
fn unreadable_file_is_recorded_and_run_continues() {
    let names = ["a-import.xlsx", "b-import.xlsx"];
    let fixture = Fixture::new(&names);
    let orchestrator = fixture.orchestrator(vec![(
        names[1],
        subheading_sheet(0, &[["2018 / 12", "0901.11", "CAFE", "1", "7", "1"]]),
    )]);

    let report = orchestrator
        .run(&FlowConfig::for_kind(FlowKind::Imports), &mut LogProgress)
        .expect("run");
    assert!(report.success);
    match &report.outcomes[0].status {
        FileStatus::Errored { detail } => assert!(detail.contains("corrupt workbook")),
        other => panic!("unexpected status: {other:?}"),
    }
    assert!(report.outcomes[1].is_processed());
}

#[test]
fn run_fails_when_no_file_succeeds() {
    let name = "2020-import-subpartidas.xlsx";
    let fixture = Fixture::new(&[name]);
    let report = fixture
        .orchestrator(vec![(name, vec![row(&["sin encabezado"])])])
        .run(&FlowConfig::for_kind(FlowKind::Imports), &mut LogProgress)
        .expect("run");

    assert!(!report.success);
    assert_eq!(report.processed_count, 0);
    assert!(!fixture.output_root.join("imports").exists());
}

#[test]
fn summary_failure_after_year_write_keeps_file_outcomes() {
    let name = "2021-import-subpartidas.xlsx";
    let fixture = Fixture::new(&[name]);
    let output_dir = fixture.output_root.join("imports");
    fs::create_dir_all(output_dir.join(SUMMARY_FILE_NAME)).expect("block summary path");

    let report = fixture
        .orchestrator(vec![(
            name,
            subheading_sheet(0, &[["2021 / 04", "0302.11", "SALMONES", "1", "8", "1"]]),
        )])
        .run(&FlowConfig::for_kind(FlowKind::Imports), &mut LogProgress)
        .expect("run reports summary failure instead of erroring");

    assert!(!report.success);
    assert!(report.configuration_error.is_none());
    assert_eq!(report.candidate_count, 1);
    assert_eq!(report.processed_count, 1);
    assert!(report.outcomes[0].is_processed());
    assert!(
        report
            .summary_error
            .as_deref()
            .is_some_and(|detail| detail.contains(SUMMARY_FILE_NAME))
    );
    assert!(output_dir.join("2021.json").is_file());
}

#[test]
fn run_without_candidates_is_a_configuration_error() {
    let fixture = Fixture::new(&["2020-import-subpartidas.xlsx"]);
    let result = fixture
        .orchestrator(Vec::new())
        .run(&FlowConfig::for_kind(FlowKind::Exports), &mut LogProgress);

    let err = result.expect_err("no export files present");
    assert!(format!("{err:#}").contains("no .xlsx files for flow 'exports'"));
    assert!(!fixture.output_root.exists());
}

#[test]
fn end_use_flow_passes_groups_through() {
    let name = "cuode-2023.xlsx";
    let fixture = Fixture::new(&[name]);
    let sheet = vec![
        row(&["Importaciones por CUODE"]),
        row(&[
            "Año",
            "Código CUODE",
            "Descripción CUODE",
            "Código Grupo",
            "Grupo",
            "Valor CIF",
            "Peso Neto",
        ]),
        row(&[
            "2023",
            "110",
            "Alimentos  (no duraderos)",
            "1",
            "BIENES DE CONSUMO",
            "250.5",
            "3",
        ]),
    ];
    let report = fixture
        .orchestrator(vec![(name, sheet)])
        .run(&FlowConfig::for_kind(FlowKind::EndUse), &mut LogProgress)
        .expect("run end-use");
    assert!(report.success);

    let data = fixture.read_json("importscuode", "2023.json");
    assert_eq!(
        data,
        serde_json::json!([{
            "date": "2023-01-01",
            "code": "0000000110",
            "label": "Alimentos",
            "group_code": "1",
            "group": "BIENES DE CONSUMO",
            "subgroup_code": "",
            "subgroup": "",
            "value_fob": 0.0,
            "value_cif": 250.5,
            "weight": 3.0
        }])
    );
}

#[test]
fn summary_index_keeps_untouched_years_and_reads_legacy_keys() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join(SUMMARY_FILE_NAME);
    fs::write(
        &path,
        r#"[{"year":"2019","total_cif":5.0,"records":3,"file":"2019.json"},
            {"year":"2020","total":7.0,"file":"2020.json"}]"#,
    )
    .expect("seed summary");

    let mut index = SummaryIndex::load(&path).expect("load summary");
    index.upsert(SummaryEntry {
        year: "2019".to_string(),
        total: 9.0,
        record_count: Some(1),
        file: "2019.json".to_string(),
    });
    index.upsert(SummaryEntry {
        year: "2021".to_string(),
        total: 1.0,
        record_count: Some(1),
        file: "2021.json".to_string(),
    });

    let years = index
        .entries()
        .iter()
        .map(|entry| entry.year.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(years, vec!["2021", "2020", "2019"]);
    assert_eq!(index.entries()[2].total, 9.0);
    assert_eq!(index.entries()[1].record_count, None);
}

#[test]
fn summary_index_rebuilds_from_unreadable_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join(SUMMARY_FILE_NAME);
    fs::write(&path, "{not json").expect("seed summary");

    let index = SummaryIndex::load(&path).expect("load summary");
    assert!(index.entries().is_empty());
}
