pub const CODE_WIDTH: usize = 10;

pub const DEFAULT_SECTOR: &str = "📦 Otros Sectores";

const SECTORS: &[(&str, &str)] = &[
    ("03", "🦐 Pesca y Crustáceos"),
    ("07", "🥦 Hortalizas"),
    ("08", "🍌 Banano y Frutas"),
    ("16", "🥫 Conservas"),
    ("18", "🍫 Cacao"),
    ("29", "🧪 Químicos Orgánicos"),
    ("30", "💊 Farmacéuticos"),
    ("39", "🧴 Plásticos"),
    ("44", "🪵 Madera"),
    ("61", "👕 Textiles (Punto)"),
    ("62", "👔 Textiles (No Punto)"),
    ("64", "👞 Calzado"),
    ("72", "🏗️ Hierro y Acero"),
    ("84", "⚙️ Maquinaria y Calderas"),
    ("85", "🔌 Tecnología/Eléctrico"),
    ("87", "🚗 Vehículos"),
];

/// Strips spreadsheet noise from a classification code and pads numeric
/// codes to `CODE_WIDTH`.
///
/// A float artifact (`"1234.0"`) is dropped before the dots are removed.
/// Dotted tariff notation that starts with a four-digit heading
/// (`"0302.11"`) names the leading digits of the subheading, so it is filled
/// on the right; any other short numeric code is zero-padded on the left.
/// Codes that are non-numeric or already `CODE_WIDTH` long pass through.
pub fn normalize_code(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_artifact = match trimmed.strip_suffix(".0") {
        Some(rest) if !rest.trim().is_empty() => rest.trim(),
        _ => trimmed,
    };

    let compact = without_artifact.replace('.', "").trim().to_string();
    let numeric = !compact.is_empty() && compact.chars().all(|c| c.is_ascii_digit());
    if !numeric || compact.len() >= CODE_WIDTH {
        return compact;
    }

    if starts_with_heading(without_artifact) {
        format!("{compact:0<width$}", width = CODE_WIDTH)
    } else {
        format!("{compact:0>width$}", width = CODE_WIDTH)
    }
}

fn starts_with_heading(code: &str) -> bool {
    let mut parts = code.splitn(2, '.');
    let heading = parts.next().unwrap_or_default();
    parts.next().is_some() && heading.len() == 4 && heading.chars().all(|c| c.is_ascii_digit())
}

/// Sector bucket for the chapter (first two characters) of a normalized code.
pub fn classify_sector(code: &str) -> &'static str {
    let chapter = code.chars().take(2).collect::<String>();
    SECTORS
        .iter()
        .find(|(prefix, _)| *prefix == chapter)
        .map(|(_, sector)| *sector)
        .unwrap_or(DEFAULT_SECTOR)
}
