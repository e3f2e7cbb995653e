// src/models/report.rs
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Rekap harian untuk satu wali santri
#[derive(Debug, Clone, Deserialize)]
pub struct GuardianReport {
    #[serde(default, deserialize_with = "lenient_string")]
    pub wali_nama: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub wali_nomor: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tanggal: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub anak: Vec<ChildAttendance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChildAttendance {
    #[serde(default, deserialize_with = "lenient_string")]
    pub nama: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub kelas: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub subuh: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub dzuhur: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub ashar: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub maghrib: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub isya: Option<String>,
}

// Backend utama kadang kirim angka atau null; nilai aneh tidak boleh menggagalkan batch
fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ChildAttendance>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ChildAttendance>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ChildAttendance {
    /// Urutan waktu sholat sesuai tampilan pesan.
    pub fn prayers(&self) -> [(&'static str, &str); 5] {
        [
            ("Subuh", status_or_dash(&self.subuh)),
            ("Dzuhur", status_or_dash(&self.dzuhur)),
            ("Ashar", status_or_dash(&self.ashar)),
            ("Maghrib", status_or_dash(&self.maghrib)),
            ("Isya", status_or_dash(&self.isya)),
        ]
    }

    pub fn kelas_label(&self) -> &str {
        status_or_dash(&self.kelas)
    }
}

fn status_or_dash(value: &Option<String>) -> &str {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => "-",
    }
}

/// Batch kiriman dari backend utama, hanya hidup selama satu request.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportBatch {
    pub reports: Vec<GuardianReport>,
}

impl ReportBatch {
    /// `reports` wajib berupa array; isi yang tidak bisa dibaca dianggap payload rusak.
    pub fn from_value(body: Value) -> Option<Self> {
        let reports = body.get("reports")?.as_array()?.clone();
        let reports = serde_json::from_value(Value::Array(reports)).ok()?;
        Some(Self { reports })
    }
}
