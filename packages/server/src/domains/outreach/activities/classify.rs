//! Email domain classification.
//!
//! Pure and total: every input string maps to exactly one `DomainType`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainType {
    Business,
    /// Consumer, privacy or disposable mailbox provider
    Free,
    /// Malformed address or empty domain
    Other,
}

impl DomainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainType::Business => "business",
            DomainType::Free => "free",
            DomainType::Other => "other",
        }
    }

    pub fn is_business(&self) -> bool {
        matches!(self, DomainType::Business)
    }
}

impl std::fmt::Display for DomainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known consumer, privacy, regional and disposable mailbox providers.
pub const FREE_EMAIL_DOMAINS: &[&str] = &[
    // Global
    "gmail.com", "yahoo.com", "hotmail.com", "outlook.com", "aol.com", "icloud.com",
    "mail.com", "protonmail.com", "zoho.com", "yandex.com",
    // Microsoft / Yahoo / Google variants
    "live.com", "msn.com", "hotmail.co.uk", "hotmail.fr", "hotmail.de", "hotmail.it",
    "hotmail.es", "outlook.co.uk", "outlook.fr", "outlook.de", "yahoo.co.uk", "yahoo.ca",
    "yahoo.com.au", "yahoo.de", "yahoo.fr", "yahoo.it", "yahoo.es", "yahoo.co.jp",
    "yahoo.co.in", "ymail.com", "rocketmail.com", "googlemail.com",
    // Privacy focused
    "fastmail.com", "tutanota.com", "tutamail.com", "hushmail.com", "mailfence.com",
    "startmail.com", "runbox.com", "posteo.de", "mailbox.org", "ctemplar.com",
    // Europe
    "guerrillamail.com", "sharklasers.com", "gmx.de", "gmx.com", "t-online.de", "web.de",
    "freenet.de", "laposte.net", "orange.fr", "wanadoo.fr", "free.fr", "sfr.fr",
    "btinternet.com", "sky.com", "virgin.net", "tiscali.co.uk", "libero.it", "virgilio.it",
    "tiscali.it", "alice.it", "terra.es", "telefonica.net", "ya.com",
    // Russia / Ukraine
    "yandex.ru", "mail.ru", "bk.ru", "inbox.ru", "list.ru", "rambler.ru", "yandex.ua",
    "ukr.net", "bigmir.net",
    // Asia
    "163.com", "126.com", "qq.com", "sina.com", "sohu.com", "yeah.net", "tom.com",
    "nifty.com", "biglobe.ne.jp", "so-net.ne.jp", "rediffmail.com", "sify.com", "in.com",
    "naver.com", "hanmail.net", "daum.net",
    // Americas / Oceania
    "sympatico.ca", "rogers.com", "bell.net", "bigpond.com", "optusnet.com.au",
    "bigpond.net.au", "bol.com.br", "terra.com.br", "ig.com.br", "uol.com.br",
    // Central Europe
    "email.cz", "seznam.cz", "o2.pl", "wp.pl", "onet.pl", "centrum.cz", "atlas.cz",
    // Disposable
    "10minutemail.com", "tempmail.org", "guerrillamail.org", "throwaway.email",
    "temp-mail.org", "maildrop.cc", "mailinator.com", "dispostable.com", "tempail.com",
    // Generic vanity providers
    "student.com", "edu.com", "inbox.com", "email.com", "usa.com", "myself.com",
    "consultant.com", "accountant.com", "engineer.com", "lawyer.com", "doctor.com",
    "iname.com", "excite.com",
];

/// The part after the `@`, lowercased and trimmed. Empty unless the address
/// has exactly one `@`.
pub fn email_domain(email: &str) -> String {
    match email.split_once('@') {
        Some((_, domain)) if !domain.contains('@') => domain.trim().to_lowercase(),
        _ => String::new(),
    }
}

pub fn is_free_domain(domain: &str) -> bool {
    FREE_EMAIL_DOMAINS.contains(&domain)
}

/// Classify the domain of an email address.
pub fn classify_email(email: &str) -> DomainType {
    let domain = email_domain(email);
    if domain.is_empty() {
        DomainType::Other
    } else if is_free_domain(&domain) {
        DomainType::Free
    } else {
        DomainType::Business
    }
}
