// src/controllers/report_controller.rs
use actix_web::error::InternalError;
use actix_web::web::JsonConfig;
use actix_web::{HttpResponse, ResponseError, get, post, web};
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::models::report::{GuardianReport, ReportBatch};
use crate::session::SessionHandle;
use crate::utils::{build_message, to_whatsapp_jid};

/// Body JSON rusak dijawab sama seperti payload tidak valid
pub fn json_config() -> JsonConfig {
    JsonConfig::default()
        .limit(5 * 1024 * 1024)
        .content_type_required(false)
        .error_handler(|err, _req| {
            log::error!("JSON payload error: {}", err);
            InternalError::from_response(err, ApiError::InvalidPayload.error_response()).into()
        })
}

#[get("/status")]
pub async fn get_status(session: web::Data<dyn SessionHandle>) -> HttpResponse {
    let state = session.state();
    HttpResponse::Ok().json(json!({
        "connected": state.is_open(),
        "user": state.identity,
    }))
}

#[post("/api/send-daily-report")]
pub async fn send_daily_report(
    session: web::Data<dyn SessionHandle>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    // 1) Validasi payload sebelum menyentuh sesi
    let batch = ReportBatch::from_value(body.into_inner()).ok_or(ApiError::InvalidPayload)?;

    // 2) Sesi harus sudah open
    if !session.state().is_open() {
        log::warn!("Kirim rekap ditolak: WhatsApp belum terhubung");
        return Err(ApiError::NotConnected);
    }

    // 3) Kirim berurutan
    let sent = dispatch_batch(session.get_ref(), &batch.reports).await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "sent": sent })))
}

/// Kirim rekap satu per satu; nomor yang tidak valid dilewati.
/// Hasilnya jumlah laporan yang diproses, bukan jumlah pesan yang sampai.
pub async fn dispatch_batch(
    session: &dyn SessionHandle,
    reports: &[GuardianReport],
) -> Result<usize, ApiError> {
    for report in reports {
        let Some(jid) = to_whatsapp_jid(report.wali_nomor.as_deref()) else {
            log::warn!(
                "Nomor wali {} tidak valid ({:?}), dilewati",
                report.wali_nama,
                report.wali_nomor
            );
            continue;
        };

        let text = build_message(report);
        session.send(&jid, &text).await.map_err(|e| {
            log::error!("Gagal kirim rekap ke {} ({}): {}", report.wali_nama, jid, e);
            e
        })?;
        log::info!("Rekap terkirim ke {} ({})", report.wali_nama, jid);
    }

    Ok(reports.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::{Identity, SessionState, SessionStatus};
    use crate::session::SessionError;
    use actix_web::http::StatusCode;
    use actix_web::http::header::ContentType;
    use actix_web::{App, test};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};
    use tokio::sync::watch;

    struct Call {
        jid: String,
        text: String,
        started: Instant,
        finished: Instant,
    }

    struct FakeSession {
        state: watch::Sender<SessionState>,
        calls: Mutex<Vec<Call>>,
        delay: Duration,
        fail_on: Option<usize>,
    }

    impl FakeSession {
        fn new(status: SessionStatus) -> Self {
            let identity = (status == SessionStatus::Open).then(|| Identity {
                id: "6289999999999@s.whatsapp.net".into(),
                name: Some("Bot Absensi".into()),
            });
            let (state, _) = watch::channel(SessionState { status, identity });
            Self {
                state,
                calls: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                fail_on: None,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SessionHandle for FakeSession {
        fn state(&self) -> SessionState {
            self.state.borrow().clone()
        }

        fn subscribe(&self) -> watch::Receiver<SessionState> {
            self.state.subscribe()
        }

        async fn send(&self, jid: &str, text: &str) -> Result<(), SessionError> {
            let started = Instant::now();
            let index = self.call_count();
            tokio::time::sleep(self.delay).await;
            self.calls.lock().unwrap().push(Call {
                jid: jid.to_string(),
                text: text.to_string(),
                started,
                finished: Instant::now(),
            });
            if self.fail_on == Some(index) {
                return Err(SessionError::Transport("socket tertutup".into()));
            }
            Ok(())
        }
    }

    fn report(nama: &str, nomor: Option<&str>) -> Value {
        json!({
            "wali_nama": nama,
            "wali_nomor": nomor,
            "tanggal": "2024-05-01",
            "anak": [{
                "nama": "Ahmad",
                "kelas": "7A",
                "subuh": "Hadir",
                "dzuhur": "Hadir",
                "ashar": "Hadir",
                "maghrib": "Alfa",
                "isya": "Hadir"
            }]
        })
    }

    macro_rules! app {
        ($fake:expr) => {{
            let session: Arc<dyn SessionHandle> = $fake.clone();
            test::init_service(
                App::new()
                    .app_data(web::Data::from(session))
                    .app_data(json_config())
                    .service(get_status)
                    .service(send_daily_report),
            )
            .await
        }};
    }

    fn post_json(body: Value) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/send-daily-report")
            .set_json(body)
    }

    #[actix_web::test]
    async fn status_reports_identity_when_open() {
        let fake = Arc::new(FakeSession::new(SessionStatus::Open));
        let app = app!(fake);

        let req = test::TestRequest::get().uri("/status").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["connected"], true);
        assert_eq!(body["user"]["id"], "6289999999999@s.whatsapp.net");
    }

    #[actix_web::test]
    async fn status_reports_null_user_when_waiting_for_scan() {
        let fake = Arc::new(FakeSession::new(SessionStatus::AwaitingScan));
        let app = app!(fake);

        let req = test::TestRequest::get().uri("/status").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body, json!({ "connected": false, "user": null }));
    }

    #[actix_web::test]
    async fn invalid_payloads_are_rejected_without_sending() {
        let fake = Arc::new(FakeSession::new(SessionStatus::Open));
        let app = app!(fake);

        for body in [json!({}), json!({ "reports": "x" }), json!({ "reports": [42] })] {
            let resp = test::call_service(&app, post_json(body.clone()).to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body, json!({ "ok": false, "error": "Payload tidak valid" }));
        }

        let req = test::TestRequest::post()
            .uri("/api/send-daily-report")
            .insert_header(ContentType::json())
            .set_payload("{bukan json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Payload tidak valid");

        assert_eq!(fake.call_count(), 0);
    }

    #[actix_web::test]
    async fn disconnected_session_fails_fast() {
        let fake = Arc::new(FakeSession::new(SessionStatus::Closed));
        let app = app!(fake);

        let resp = test::call_service(
            &app,
            post_json(json!({ "reports": [report("Ibu Siti", Some("081111111111"))] })).to_request(),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], crate::error::NOT_CONNECTED_MESSAGE);
        assert_eq!(fake.call_count(), 0);
    }

    #[actix_web::test]
    async fn invalid_phone_is_skipped_but_counted() {
        let fake = Arc::new(FakeSession::new(SessionStatus::Open));
        let app = app!(fake);

        let resp = test::call_service(
            &app,
            post_json(json!({
                "reports": [
                    report("Ibu Siti", Some("081111111111")),
                    report("Bapak Joko", Some("")),
                ]
            }))
            .to_request(),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "ok": true, "sent": 2 }));

        let calls = fake.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].jid, "6281111111111@s.whatsapp.net");
        assert!(calls[0].text.starts_with("Assalamu'alaikum Ibu Siti,\n"));
        assert!(calls[0].text.ends_with("Terima kasih."));
    }

    #[actix_web::test]
    async fn numeric_phone_is_skipped_not_rejected() {
        let fake = Arc::new(FakeSession::new(SessionStatus::Open));
        let app = app!(fake);

        let mut joko = report("Bapak Joko", None);
        joko["wali_nomor"] = json!(0);
        let resp = test::call_service(
            &app,
            post_json(json!({ "reports": [report("Ibu Siti", Some("081111111111")), joko] }))
                .to_request(),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "ok": true, "sent": 2 }));

        let calls = fake.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].jid, "6281111111111@s.whatsapp.net");
    }

    #[actix_web::test]
    async fn sends_are_strictly_sequential() {
        let mut session = FakeSession::new(SessionStatus::Open);
        session.delay = Duration::from_millis(20);
        let fake = Arc::new(session);
        let app = app!(fake);

        let resp = test::call_service(
            &app,
            post_json(json!({
                "reports": [
                    report("Wali 1", Some("081111111111")),
                    report("Wali 2", Some("082222222222")),
                    report("Wali 3", Some("+6283333333333")),
                ]
            }))
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let calls = fake.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].jid, "6283333333333@s.whatsapp.net");
        for pair in calls.windows(2) {
            assert!(pair[1].started >= pair[0].finished);
        }
    }

    #[actix_web::test]
    async fn send_failure_aborts_remaining_reports() {
        let mut session = FakeSession::new(SessionStatus::Open);
        session.fail_on = Some(1);
        let fake = Arc::new(session);
        let app = app!(fake);

        let resp = test::call_service(
            &app,
            post_json(json!({
                "reports": [
                    report("Wali 1", Some("081111111111")),
                    report("Wali 2", Some("082222222222")),
                    report("Wali 3", Some("083333333333")),
                ]
            }))
            .to_request(),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "Gagal mengirim pesan: socket tertutup");
        assert_eq!(fake.call_count(), 2);
    }
}
