use std::path::{Path, PathBuf};

use crate::cli::FlowKind;
use crate::model::CanonicalRecord;

use super::describe::CleaningProfile;
use super::text::normalize_text;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Field {
    Period,
    Code,
    Description,
    Weight,
    Fob,
    Cif,
    GroupCode,
    GroupName,
    SubgroupCode,
    SubgroupName,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Period => "period",
            Self::Code => "code",
            Self::Description => "description",
            Self::Weight => "weight",
            Self::Fob => "fob",
            Self::Cif => "cif",
            Self::GroupCode => "group_code",
            Self::GroupName => "group",
            Self::SubgroupCode => "subgroup_code",
            Self::SubgroupName => "subgroup",
        }
    }
}

/// Accepted header spellings for one canonical field, in preference order.
/// Spellings are compared after `normalize_text`, so accents and casing here
/// are cosmetic.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub field: Field,
    pub spellings: &'static [&'static str],
}

const SUBHEADING_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        field: Field::Period,
        spellings: &["Período"],
    },
    ColumnSpec {
        field: Field::Code,
        spellings: &["Código Subpartida"],
    },
    ColumnSpec {
        field: Field::Description,
        spellings: &["Subpartida", "Descripción Subpartida", "Descripción"],
    },
    ColumnSpec {
        field: Field::Weight,
        spellings: &["TM (Peso Neto)", "Peso Neto", "TM", "Peso"],
    },
    ColumnSpec {
        field: Field::Fob,
        spellings: &["FOB", "Valor FOB"],
    },
    ColumnSpec {
        field: Field::Cif,
        spellings: &["CIF", "Valor CIF"],
    },
];

const END_USE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        field: Field::Period,
        spellings: &["Período", "Año", "Anio"],
    },
    ColumnSpec {
        field: Field::Code,
        spellings: &["Código CUODE", "CUODE"],
    },
    ColumnSpec {
        field: Field::Description,
        spellings: &["Descripción CUODE", "Descripción"],
    },
    ColumnSpec {
        field: Field::GroupCode,
        spellings: &["Código Grupo", "Código Grupo CUODE"],
    },
    ColumnSpec {
        field: Field::GroupName,
        spellings: &["Grupo", "Grupo CUODE", "Descripción Grupo"],
    },
    ColumnSpec {
        field: Field::SubgroupCode,
        spellings: &["Código Subgrupo", "Código Subgrupo CUODE"],
    },
    ColumnSpec {
        field: Field::SubgroupName,
        spellings: &["Subgrupo", "Subgrupo CUODE", "Descripción Subgrupo"],
    },
    ColumnSpec {
        field: Field::Weight,
        spellings: &["TM (Peso Neto)", "Peso Neto", "Peso", "TM"],
    },
    ColumnSpec {
        field: Field::Fob,
        spellings: &["FOB", "Valor FOB"],
    },
    ColumnSpec {
        field: Field::Cif,
        spellings: &["CIF", "Valor CIF"],
    },
];

const REQUIRED_FIELDS: &[Field] = &[Field::Period, Field::Code];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Measure {
    Fob,
    Cif,
}

impl Measure {
    pub fn of(self, record: &CanonicalRecord) -> f64 {
        match self {
            Self::Fob => record.value_fob,
            Self::Cif => record.value_cif,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClassificationStrategy {
    SectorLookup,
    GroupPassthrough,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FileFilter {
    Any,
    Contains(&'static str),
    Excludes(&'static str),
}

impl FileFilter {
    /// Tokens match whole words of the normalized name, so `export` routes
    /// `2020-export.xlsx` but not `exportadores-import.xlsx`.
    pub fn accepts(self, file_name: &str) -> bool {
        let name = normalize_text(file_name);
        match self {
            Self::Any => true,
            Self::Contains(token) => has_word(&name, token),
            Self::Excludes(token) => !has_word(&name, token),
        }
    }
}

fn has_word(name: &str, token: &str) -> bool {
    name.split(|c: char| !c.is_alphanumeric())
        .any(|word| word == token)
}

#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub kind: FlowKind,
    pub output_subdir: &'static str,
    pub filter: FileFilter,
    pub primary_measure: Measure,
    pub classification: ClassificationStrategy,
    pub cleaning: CleaningProfile,
    pub columns: &'static [ColumnSpec],
    pub required: &'static [Field],
}

impl FlowConfig {
    pub fn for_kind(kind: FlowKind) -> Self {
        match kind {
            FlowKind::Imports => Self {
                kind,
                output_subdir: "imports",
                filter: FileFilter::Excludes("export"),
                primary_measure: Measure::Cif,
                classification: ClassificationStrategy::SectorLookup,
                cleaning: CleaningProfile::Aggressive,
                columns: SUBHEADING_COLUMNS,
                required: REQUIRED_FIELDS,
            },
            FlowKind::Exports => Self {
                kind,
                output_subdir: "exports",
                filter: FileFilter::Contains("export"),
                primary_measure: Measure::Fob,
                classification: ClassificationStrategy::SectorLookup,
                cleaning: CleaningProfile::Aggressive,
                columns: SUBHEADING_COLUMNS,
                required: REQUIRED_FIELDS,
            },
            FlowKind::EndUse => Self {
                kind,
                output_subdir: "importscuode",
                filter: FileFilter::Any,
                primary_measure: Measure::Cif,
                classification: ClassificationStrategy::GroupPassthrough,
                cleaning: CleaningProfile::Light,
                columns: END_USE_COLUMNS,
                required: REQUIRED_FIELDS,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn output_dir(&self, output_root: &Path) -> PathBuf {
        output_root.join(self.output_subdir)
    }

    /// Normalized spellings of a field; empty when the flow has no such column.
    pub fn spellings(&self, field: Field) -> Vec<String> {
        self.columns
            .iter()
            .filter(|spec| spec.field == field)
            .flat_map(|spec| spec.spellings.iter())
            .map(|spelling| normalize_text(spelling))
            .collect()
    }
}
