use std::fmt::Write;

use docketcc_common::DigestType;

use crate::content::{DigestPayload, FilingSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub fn subject(payload: &DigestPayload) -> String {
    let docket = &payload.docket_number;
    let count = payload.filings.len();
    let filings = if count == 1 { "filing" } else { "filings" };

    match payload.digest_type {
        DigestType::SeedDigest => {
            format!("Catch up on FCC docket {docket}: {count} recent {filings}")
        }
        DigestType::Immediate => match payload.filings.as_slice() {
            [only] => format!("New filing in FCC docket {docket}: {}", only.title),
            _ => format!("{count} new {filings} in FCC docket {docket}"),
        },
        DigestType::Daily => format!("Daily digest: {count} new {filings} in FCC docket {docket}"),
        DigestType::Weekly => {
            format!("Weekly digest: {count} new {filings} in FCC docket {docket}")
        }
    }
}

/// Render a queued digest. Uses the stored payload only; the subscriber's
/// current tier is never consulted.
pub fn render_digest(payload: &DigestPayload, app_url: &str) -> RenderedEmail {
    let app_url = app_url.trim_end_matches('/');
    RenderedEmail {
        subject: subject(payload),
        html: render_html(payload, app_url),
        text: render_text(payload, app_url),
    }
}

fn render_text(payload: &DigestPayload, app_url: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}\n", subject(payload));

    if let Some(reminder) = &payload.trial_reminder {
        let _ = writeln!(
            out,
            "Your trial ends in {} day(s). Upgrade to keep AI summaries: {app_url}/upgrade\n",
            reminder.days_remaining
        );
    }

    for filing in &payload.filings {
        let _ = writeln!(out, "{}", filing.title);
        let _ = writeln!(
            out,
            "{} | {} | {}",
            filing.author,
            filing.filing_type,
            filing.date_received.format("%b %-d, %Y")
        );
        if let Some(analysis) = &filing.analysis {
            let _ = writeln!(out, "\n{}", analysis.summary);
            for point in &analysis.key_points {
                let _ = writeln!(out, "  - {point}");
            }
            if !analysis.stakeholders.is_empty() {
                let _ = writeln!(out, "Stakeholders: {}", analysis.stakeholders.join(", "));
            }
            if !analysis.regulatory_impact.is_empty() {
                let _ = writeln!(out, "Regulatory impact: {}", analysis.regulatory_impact);
            }
        }
        let _ = writeln!(out, "{}\n", filing.filing_url);
    }

    if payload.upgrade_prompt {
        let _ = writeln!(
            out,
            "Want AI summaries, key points and stakeholder analysis? Upgrade to Pro: {app_url}/upgrade\n"
        );
    }

    let _ = writeln!(out, "Manage your subscriptions: {app_url}/dashboard");
    out
}

fn render_html(payload: &DigestPayload, app_url: &str) -> String {
    let mut out = String::new();
    out.push_str("<div style=\"font-family: -apple-system, Helvetica, Arial, sans-serif; max-width: 640px; margin: 0 auto;\">");
    let _ = write!(out, "<h2>{}</h2>", escape(&subject(payload)));

    if let Some(reminder) = &payload.trial_reminder {
        let _ = write!(
            out,
            "<p style=\"background: #fff7e6; padding: 12px;\">Your trial ends in {} day(s). \
             <a href=\"{app_url}/upgrade\">Upgrade</a> to keep AI summaries.</p>",
            reminder.days_remaining
        );
    }

    for filing in &payload.filings {
        render_filing_html(&mut out, filing);
    }

    if payload.upgrade_prompt {
        let _ = write!(
            out,
            "<p style=\"background: #eef4ff; padding: 12px;\">Want AI summaries, key points and \
             stakeholder analysis? <a href=\"{app_url}/upgrade\">Upgrade to Pro</a>.</p>"
        );
    }

    let _ = write!(
        out,
        "<p style=\"color: #666; font-size: 12px;\"><a href=\"{app_url}/dashboard\">Manage your subscriptions</a></p></div>"
    );
    out
}

fn render_filing_html(out: &mut String, filing: &FilingSnapshot) {
    let _ = write!(
        out,
        "<div style=\"border-top: 1px solid #ddd; padding: 12px 0;\">\
         <h3><a href=\"{}\">{}</a></h3>\
         <p style=\"color: #555;\">{} &middot; {} &middot; {}</p>",
        escape(&filing.filing_url),
        escape(&filing.title),
        escape(&filing.author),
        escape(&filing.filing_type),
        filing.date_received.format("%b %-d, %Y"),
    );

    if let Some(analysis) = &filing.analysis {
        let _ = write!(out, "<p>{}</p>", escape(&analysis.summary));
        if !analysis.key_points.is_empty() {
            out.push_str("<ul>");
            for point in &analysis.key_points {
                let _ = write!(out, "<li>{}</li>", escape(point));
            }
            out.push_str("</ul>");
        }
        if !analysis.stakeholders.is_empty() {
            let _ = write!(
                out,
                "<p><strong>Stakeholders:</strong> {}</p>",
                escape(&analysis.stakeholders.join(", "))
            );
        }
        if !analysis.regulatory_impact.is_empty() {
            let _ = write!(
                out,
                "<p><strong>Regulatory impact:</strong> {}</p>",
                escape(&analysis.regulatory_impact)
            );
        }
    }
    out.push_str("</div>");
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{FilingAnalysis, TrialReminder};
    use chrono::{TimeZone, Utc};
    use docketcc_common::Tier;

    fn snapshot(id: &str, analysis: bool) -> FilingSnapshot {
        FilingSnapshot {
            id: id.into(),
            title: format!("Comments <{id}>"),
            author: "AT&T".into(),
            filing_type: "COMMENT".into(),
            date_received: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            filing_url: format!("https://www.fcc.gov/ecfs/search/search-filings/filing/{id}"),
            analysis: analysis.then(|| FilingAnalysis {
                summary: "Supports the proposal.".into(),
                key_points: vec!["Faster rollout".into()],
                stakeholders: vec!["Consumers".into()],
                regulatory_impact: "Strengthens the record.".into(),
                confidence: 0.8,
            }),
        }
    }

    fn payload(tier: Tier, digest_type: DigestType, filings: Vec<FilingSnapshot>) -> DigestPayload {
        DigestPayload {
            docket_number: "23-108".into(),
            digest_type,
            tier,
            filings,
            upgrade_prompt: tier == Tier::Free,
            trial_reminder: None,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn subjects_by_digest_type() {
        let one = payload(Tier::Pro, DigestType::Immediate, vec![snapshot("1", true)]);
        assert_eq!(subject(&one), "New filing in FCC docket 23-108: Comments <1>");

        let two = payload(Tier::Pro, DigestType::Daily, vec![snapshot("1", true), snapshot("2", true)]);
        assert_eq!(subject(&two), "Daily digest: 2 new filings in FCC docket 23-108");

        let seed = payload(Tier::Free, DigestType::SeedDigest, vec![snapshot("1", false)]);
        assert_eq!(subject(&seed), "Catch up on FCC docket 23-108: 1 recent filing");
    }

    #[test]
    fn free_render_has_cta_and_no_analysis() {
        let email = render_digest(
            &payload(Tier::Free, DigestType::Daily, vec![snapshot("1", false)]),
            "https://docketcc.com/",
        );
        assert!(email.text.contains("Upgrade to Pro: https://docketcc.com/upgrade"));
        assert!(email.html.contains("Upgrade to Pro"));
        assert!(!email.text.contains("Supports the proposal"));
        assert!(email.text.contains("https://docketcc.com/dashboard"));
    }

    #[test]
    fn trial_render_has_reminder_and_analysis() {
        let mut p = payload(Tier::Trial, DigestType::Weekly, vec![snapshot("1", true)]);
        p.trial_reminder = Some(TrialReminder {
            expires_at: Utc::now(),
            days_remaining: 4,
        });
        let email = render_digest(&p, "https://docketcc.com");
        assert!(email.text.contains("Your trial ends in 4 day(s)"));
        assert!(email.text.contains("Supports the proposal."));
        assert!(email.text.contains("  - Faster rollout"));
        assert!(email.html.contains("<li>Faster rollout</li>"));
        assert!(!email.text.contains("Upgrade to Pro"));
    }

    #[test]
    fn html_is_escaped() {
        let email = render_digest(
            &payload(Tier::Pro, DigestType::Immediate, vec![snapshot("1", false)]),
            "https://docketcc.com",
        );
        assert!(email.html.contains("Comments &lt;1&gt;"));
        assert!(email.html.contains("AT&amp;T"));
        assert!(!email.html.contains("<1>"));
    }
}
