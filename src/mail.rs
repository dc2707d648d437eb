//! Report delivery over SMTP.
//!
//! Composition and transport are separated: [`compose_report_message`]
//! builds one [`ComposedMessage`] (HTML body, inline page previews, PDF
//! attachment) and [`dispatch_report`] hands it to a [`Mailer`] once per
//! recipient batch. The lettre-backed [`SmtpMailer`] is the production
//! transport; tests substitute a recording mock.
//!
//! Recipients always travel as Bcc with the internal address in To, so
//! investors never see each other's addresses.

use crate::config::RunConfig;
use crate::error::ReportError;
use crate::record::{ProjectRecord, KEY_PROJECT_NAME, KEY_PROJECT_NUMBER, KEY_REPORT_NUMBER};
use image::imageops::FilterType;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Body, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;
use tracing::{debug, info};

/// Width of inline page previews in the mail body.
const INLINE_IMAGE_WIDTH: u32 = 800;

/// SMTP endpoint and credentials for the production transport.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// From header, e.g. `"Reports <reports@example.com>"`.
    pub from: String,
}

impl SmtpConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: 587,
            username: username.into(),
            password: password.into(),
            from: from.into(),
        }
    }
}

/// A page preview embedded in the HTML body by content id.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub cid: String,
    pub png: Vec<u8>,
}

/// One fully composed report mail, minus its recipient list.
#[derive(Debug, Clone)]
pub struct ComposedMessage {
    pub subject: String,
    pub html: String,
    pub inline_images: Vec<InlineImage>,
    pub attachment_name: String,
    pub attachment: Vec<u8>,
}

/// Transport seam: sends one composed message to one recipient batch.
pub trait Mailer {
    fn send(
        &self,
        message: &ComposedMessage,
        to: &str,
        bcc: &[String],
    ) -> impl std::future::Future<Output = Result<(), ReportError>> + Send;
}

/// Build the report mail for one project: greeting with report number and
/// project number/name, every composed page inlined as a preview, the
/// final PDF attached.
pub fn compose_report_message(
    record: &ProjectRecord,
    page_images: &[impl AsRef<Path>],
    pdf_path: &Path,
) -> Result<ComposedMessage, ReportError> {
    let report_number = record.text(KEY_REPORT_NUMBER)?;
    let project_number = record.text(KEY_PROJECT_NUMBER)?;
    let project_name = record.text(KEY_PROJECT_NAME)?;

    let mut inline_images = Vec::with_capacity(page_images.len());
    let mut body_images = String::new();
    for (idx, page) in page_images.iter().enumerate() {
        let cid = format!("page{}", idx + 1);
        inline_images.push(InlineImage {
            png: inline_png(page.as_ref())?,
            cid: cid.clone(),
        });
        body_images.push_str(&format!(
            "<p><img src=\"cid:{cid}\" width=\"{INLINE_IMAGE_WIDTH}\" alt=\"Page {}\"/></p>\n",
            idx + 1
        ));
    }

    let html = format!(
        "<html><body>\
         <p>Dear investor,</p>\
         <p>Please find below progress report No. {report_number} for project \
         {project_number}, {project_name}. The full report is attached as a PDF.</p>\n\
         {body_images}\
         <p>Kind regards,<br/>The reporting team</p>\
         </body></html>"
    );

    let attachment = std::fs::read(pdf_path).map_err(|_| ReportError::AssetMissing {
        path: pdf_path.to_path_buf(),
    })?;

    Ok(ComposedMessage {
        subject: format!("Progress report No. {report_number}: {project_name}"),
        html,
        inline_images,
        attachment_name: format!("Report_{report_number}_{project_number}.pdf"),
        attachment,
    })
}

/// Send a composed message to its audience.
///
/// Test runs (production false) go only to the internal address; the
/// returned summary says how many investors a production run would have
/// reached. Production runs chunk the list at the batch cap and send the
/// batches sequentially, each with the internal address in To.
pub async fn dispatch_report<M: Mailer>(
    mailer: &M,
    message: &ComposedMessage,
    recipients: &[String],
    config: &RunConfig,
    production: bool,
) -> Result<String, ReportError> {
    if !production {
        mailer.send(message, &config.internal_address, &[]).await?;
        info!(
            "Test run: sent to {} only ({} real recipients withheld)",
            config.internal_address,
            recipients.len()
        );
        return Ok(format!(
            "test run, would have been sent to {} recipient(s)",
            recipients.len()
        ));
    }

    let mut batches: Vec<&[String]> = recipients.chunks(config.batch_cap).collect();
    if batches.is_empty() {
        batches.push(&[]);
    }
    for (idx, batch) in batches.iter().enumerate() {
        debug!(
            "Sending batch {}/{} ({} recipients)",
            idx + 1,
            batches.len(),
            batch.len()
        );
        mailer.send(message, &config.internal_address, batch).await?;
    }
    info!(
        "Sent to {} recipient(s) in {} batch(es)",
        recipients.len(),
        batches.len()
    );
    Ok(format!("sent to {} recipient(s)", recipients.len()))
}

/// lettre SMTP transport over STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, ReportError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| ReportError::InvalidConfig(format!("bad From address: {e}")))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| ReportError::transport("smtp", e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self { transport, from })
    }

    fn build_email(
        &self,
        message: &ComposedMessage,
        to: &str,
        bcc: &[String],
    ) -> Result<Message, ReportError> {
        let parse = |addr: &str| -> Result<Mailbox, ReportError> {
            addr.parse()
                .map_err(|e| ReportError::InvalidInput(format!("bad address '{addr}': {e}")))
        };

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(parse(to)?)
            .subject(message.subject.clone());
        for addr in bcc {
            builder = builder.bcc(parse(addr)?);
        }

        let png_type = ContentType::parse("image/png")
            .map_err(|e| ReportError::Internal(format!("content type: {e}")))?;
        let pdf_type = ContentType::parse("application/pdf")
            .map_err(|e| ReportError::Internal(format!("content type: {e}")))?;

        let mut related = MultiPart::related().singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(message.html.clone()),
        );
        for img in &message.inline_images {
            related = related.singlepart(
                Attachment::new_inline(img.cid.clone())
                    .body(Body::new(img.png.clone()), png_type.clone()),
            );
        }
        let mixed = MultiPart::mixed().multipart(related).singlepart(
            Attachment::new(message.attachment_name.clone())
                .body(Body::new(message.attachment.clone()), pdf_type),
        );

        builder
            .multipart(mixed)
            .map_err(|e| ReportError::Internal(format!("message build failed: {e}")))
    }
}

impl Mailer for SmtpMailer {
    async fn send(
        &self,
        message: &ComposedMessage,
        to: &str,
        bcc: &[String],
    ) -> Result<(), ReportError> {
        let email = self.build_email(message, to, bcc)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| ReportError::transport("smtp", e.to_string()))?;
        Ok(())
    }
}

/// Load a page image and re-encode it as a PNG preview at the inline
/// width, keeping aspect ratio.
fn inline_png(path: &Path) -> Result<Vec<u8>, ReportError> {
    if !path.exists() {
        return Err(ReportError::AssetMissing {
            path: path.to_path_buf(),
        });
    }
    let img = image::open(path)
        .map_err(|e| ReportError::Internal(format!("cannot decode '{}': {e}", path.display())))?;
    let height = (INLINE_IMAGE_WIDTH as f64 * img.height() as f64 / img.width() as f64)
        .round()
        .max(1.0) as u32;
    let resized = img.resize_exact(INLINE_IMAGE_WIDTH, height, FilterType::Triangle);
    let mut out = Vec::new();
    resized
        .write_to(
            &mut std::io::Cursor::new(&mut out),
            image::ImageFormat::Png,
        )
        .map_err(|e| ReportError::Internal(format!("PNG encode failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::KEY_PROJECT_ID;
    use image::{DynamicImage, RgbaImage};
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct RecordingMailer {
        sends: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl RecordingMailer {
        fn new() -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
            }
        }
        fn sends(&self) -> Vec<(String, Vec<String>)> {
            self.sends.lock().unwrap().clone()
        }
    }

    impl Mailer for RecordingMailer {
        async fn send(
            &self,
            _message: &ComposedMessage,
            to: &str,
            bcc: &[String],
        ) -> Result<(), ReportError> {
            self.sends
                .lock()
                .unwrap()
                .push((to.to_string(), bcc.to_vec()));
            Ok(())
        }
    }

    fn test_message() -> ComposedMessage {
        ComposedMessage {
            subject: "s".into(),
            html: "<html/>".into(),
            inline_images: vec![],
            attachment_name: "r.pdf".into(),
            attachment: vec![1, 2, 3],
        }
    }

    fn test_config() -> RunConfig {
        RunConfig::builder("/tmp/w", "/tmp/t")
            .internal_address("ops@example.com")
            .batch_cap(3)
            .build()
            .unwrap()
    }

    fn addresses(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("inv{i}@example.com")).collect()
    }

    #[tokio::test]
    async fn test_run_goes_only_to_internal_address() {
        let mailer = RecordingMailer::new();
        let summary = dispatch_report(&mailer, &test_message(), &addresses(7), &test_config(), false)
            .await
            .unwrap();
        assert_eq!(summary, "test run, would have been sent to 7 recipient(s)");
        let sends = mailer.sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].0, "ops@example.com");
        assert!(sends[0].1.is_empty());
    }

    #[tokio::test]
    async fn production_run_batches_at_cap() {
        let mailer = RecordingMailer::new();
        let summary = dispatch_report(&mailer, &test_message(), &addresses(7), &test_config(), true)
            .await
            .unwrap();
        assert_eq!(summary, "sent to 7 recipient(s)");
        let sends = mailer.sends();
        assert_eq!(sends.len(), 3);
        assert_eq!(sends[0].1.len(), 3);
        assert_eq!(sends[1].1.len(), 3);
        assert_eq!(sends[2].1.len(), 1);
        assert!(sends.iter().all(|(to, _)| to == "ops@example.com"));
    }

    #[tokio::test]
    async fn production_run_with_no_recipients_still_reaches_internal() {
        let mailer = RecordingMailer::new();
        dispatch_report(&mailer, &test_message(), &[], &test_config(), true)
            .await
            .unwrap();
        assert_eq!(mailer.sends().len(), 1);
    }

    #[test]
    fn compose_inlines_every_page_and_attaches_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages: Vec<PathBuf> = Vec::new();
        for i in 1..=3 {
            let p = dir.path().join(format!("page{i}.png"));
            DynamicImage::ImageRgba8(RgbaImage::new(400, 200))
                .save(&p)
                .unwrap();
            pages.push(p);
        }
        let pdf = dir.path().join("report.pdf");
        std::fs::write(&pdf, b"%PDF-1.5 fake").unwrap();

        let record = ProjectRecord::from_document(&json!({
            KEY_PROJECT_ID: "PM-X7",
            KEY_REPORT_NUMBER: 11,
            KEY_PROJECT_NUMBER: "P-204",
            KEY_PROJECT_NAME: "Solar Farm",
        }));
        let msg = compose_report_message(&record, &pages, &pdf).unwrap();
        assert_eq!(msg.inline_images.len(), 3);
        assert_eq!(msg.inline_images[0].cid, "page1");
        assert!(msg.html.contains("cid:page3"));
        assert!(msg.html.contains("report No. 11"));
        assert!(msg.html.contains("Solar Farm"));
        assert_eq!(msg.attachment_name, "Report_11_P-204.pdf");
        assert_eq!(msg.attachment, std::fs::read(&pdf).unwrap());

        let preview = image::load_from_memory(&msg.inline_images[0].png).unwrap();
        assert_eq!(preview.width(), 800);
        assert_eq!(preview.height(), 400);
    }

    #[test]
    fn compose_fails_without_report_number() {
        let record = ProjectRecord::from_document(&json!({ KEY_PROJECT_ID: "PM-X7" }));
        let err =
            compose_report_message(&record, &Vec::<PathBuf>::new(), Path::new("/nope.pdf"))
                .unwrap_err();
        assert!(matches!(err, ReportError::MissingField { .. }));
    }
}
