//! Tabular exports of the subscription ledger, sent to admins as CSV
//! documents.

use chrono::NaiveDateTime;

/// Which ledger record set to export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportKind {
    Active,
    Expired,
    OldExpired,
}

impl ReportKind {
    pub fn file_name(&self) -> &'static str {
        "Отчет.csv"
    }

    pub fn caption(&self) -> &'static str {
        match self {
            ReportKind::Active => "Вот отчет о всех действующих подписках на КөмекБай:",
            ReportKind::Expired => "Вот отчет о пользователях с истекшей подпиской:",
            ReportKind::OldExpired => {
                "Вот отчет о пользователях, чья подписка истекла более месяца назад:"
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReportRow {
    pub user_id: i64,
    pub username: Option<String>,
    pub phone: String,
    pub subscribed_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

pub fn render_csv(rows: &[ReportRow]) -> String {
    let mut out = String::from(
        "User ID,Username,Номер телефона,Дата начала Подписки,Дата окончания Подписки\n",
    );
    for row in rows {
        let username = row.username.as_deref().unwrap_or("-");
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            row.user_id,
            csv_field(username),
            csv_field(&row.phone),
            row.subscribed_at.format("%d-%m-%y"),
            row.expires_at.format("%d-%m-%y"),
        ));
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn renders_rows_with_short_dates() {
        let rows = vec![ReportRow {
            user_id: 7,
            username: Some("aruzhan".to_string()),
            phone: "+77010000001".to_string(),
            subscribed_at: ts("2026-08-04T12:00:00"),
            expires_at: ts("2026-09-03T12:00:00"),
        }];
        let csv = render_csv(&rows);
        assert!(csv.ends_with("7,aruzhan,+77010000001,04-08-26,03-09-26\n"));
    }

    #[test]
    fn missing_username_renders_dash() {
        let rows = vec![ReportRow {
            user_id: 7,
            username: None,
            phone: "+7".to_string(),
            subscribed_at: ts("2026-08-04T12:00:00"),
            expires_at: ts("2026-09-03T12:00:00"),
        }];
        assert!(render_csv(&rows).contains("7,-,+7,"));
    }

    #[test]
    fn fields_with_separators_are_quoted() {
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("plain"), "plain");
    }
}
