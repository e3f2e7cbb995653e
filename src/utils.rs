//utils.rs
use crate::models::report::GuardianReport;

pub const COUNTRY_CODE: &str = "62";
pub const JID_SUFFIX: &str = "@s.whatsapp.net";

// Normalisasi nomor HP wali ke format nomor internasional (tanpa '+')
pub fn normalize_phone(phone: &str) -> Option<String> {
    // Buang semua karakter selain angka, '+' hanya dipertahankan di depan
    let mut cleaned = String::with_capacity(phone.len());
    for c in phone.chars() {
        if c.is_ascii_digit() || (c == '+' && cleaned.is_empty()) {
            cleaned.push(c);
        }
    }

    let local = cleaned.trim_start_matches('+');

    // Prefix trunk lokal '0' diganti kode negara
    let digits = match local.strip_prefix('0') {
        Some(rest) => format!("{}{}", COUNTRY_CODE, rest),
        None => local.to_string(),
    };

    if digits.is_empty() || digits == COUNTRY_CODE {
        None
    } else {
        Some(digits)
    }
}

/// Alamat tujuan di jaringan WhatsApp, `None` kalau nomor tidak bisa dipakai.
pub fn to_whatsapp_jid(phone: Option<&str>) -> Option<String> {
    normalize_phone(phone?).map(|digits| format!("{}{}", digits, JID_SUFFIX))
}

/// Ambil bagian nomor dari JID (`628xx@s.whatsapp.net` -> `628xx`).
pub fn jid_number(jid: &str) -> &str {
    jid.split('@').next().unwrap_or(jid)
}

pub fn build_message(report: &GuardianReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("Assalamu'alaikum {},", report.wali_nama));
    lines.push(format!("Rekap absensi sholat hari ini ({}):", report.tanggal));
    lines.push(String::new());

    for (idx, anak) in report.anak.iter().enumerate() {
        lines.push(format!("{}) {} ({})", idx + 1, anak.nama, anak.kelas_label()));
        for (waktu, status) in anak.prayers() {
            lines.push(format!("   - {:<8}: {}", waktu, status));
        }
        lines.push(String::new());
    }

    lines.push("Terima kasih.".to_string());
    lines.join("\n")
}
