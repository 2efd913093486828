//! Compiled-in message catalog for the four marketplace locales.

use std::{fmt, str::FromStr};

use crate::otp::OtpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Locale {
    #[default]
    En,
    Hi,
    Mr,
    Ta,
}

impl Locale {
    pub const ALL: [Self; 4] = [Self::En, Self::Hi, Self::Mr, Self::Ta];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Hi => "hi",
            Self::Mr => "mr",
            Self::Ta => "ta",
        }
    }

    /// Pick a locale from an `Accept-Language` header value.
    ///
    /// Entries are ordered by quality (ties keep header order) and the first
    /// supported primary tag wins; anything else falls back to English.
    #[must_use]
    pub fn from_accept_language(header: &str) -> Self {
        let mut entries: Vec<(&str, f32)> = header
            .split(',')
            .filter_map(|entry| {
                let mut parts = entry.split(';');
                let tag = parts.next()?.trim();
                if tag.is_empty() {
                    return None;
                }
                let quality = parts
                    .find_map(|param| param.trim().strip_prefix("q="))
                    .and_then(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((tag, quality))
            })
            .filter(|(_, quality)| *quality > 0.0)
            .collect();

        entries.sort_by(|a, b| b.1.total_cmp(&a.1));

        entries
            .iter()
            .find_map(|(tag, _)| tag.parse::<Self>().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = String;

    /// Accepts a language tag such as `hi`, `hi-IN`, or `ta_IN`.
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let primary = tag
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Ok(Self::En),
            "hi" => Ok(Self::Hi),
            "mr" => Ok(Self::Mr),
            "ta" => Ok(Self::Ta),
            _ => Err(format!("unsupported locale: {tag}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    RateLimited,
    DeliveryFailed,
    NotFound,
    Expired,
    AlreadyUsed,
    TooManyAttempts,
    InvalidCode,
    InvalidIdentifierFormat,
    InvalidCodeFormat,
    Unavailable,
    Unauthorized,
    CodeSms,
}

impl Message {
    pub const ALL: [Self; 12] = [
        Self::RateLimited,
        Self::DeliveryFailed,
        Self::NotFound,
        Self::Expired,
        Self::AlreadyUsed,
        Self::TooManyAttempts,
        Self::InvalidCode,
        Self::InvalidIdentifierFormat,
        Self::InvalidCodeFormat,
        Self::Unavailable,
        Self::Unauthorized,
        Self::CodeSms,
    ];
}

impl From<&OtpError> for Message {
    fn from(error: &OtpError) -> Self {
        match error {
            OtpError::RateLimited { .. } => Self::RateLimited,
            OtpError::DeliveryFailed { .. } => Self::DeliveryFailed,
            OtpError::NotFound => Self::NotFound,
            OtpError::Expired => Self::Expired,
            OtpError::AlreadyUsed => Self::AlreadyUsed,
            OtpError::TooManyAttempts => Self::TooManyAttempts,
            OtpError::InvalidCode { .. } => Self::InvalidCode,
            OtpError::InvalidIdentifierFormat => Self::InvalidIdentifierFormat,
            OtpError::InvalidCodeFormat => Self::InvalidCodeFormat,
            OtpError::Unavailable => Self::Unavailable,
        }
    }
}

/// Raw catalog entry. `{n}` and `{code}` are placeholders.
#[must_use]
#[allow(clippy::too_many_lines)]
pub const fn template(locale: Locale, message: Message) -> &'static str {
    match (locale, message) {
        (Locale::En, Message::RateLimited) => "Too many requests. Please try again in {n} seconds.",
        (Locale::En, Message::DeliveryFailed) => "We could not send your code. Please try again shortly.",
        (Locale::En, Message::NotFound) => "No code was requested for this number or email. Please request a new code.",
        (Locale::En, Message::Expired) => "This code has expired. Please request a new code.",
        (Locale::En, Message::AlreadyUsed) => "This code has already been used. Please request a new code.",
        (Locale::En, Message::TooManyAttempts) => "Too many incorrect attempts. Please request a new code.",
        (Locale::En, Message::InvalidCode) => "Incorrect code. {n} attempts remaining.",
        (Locale::En, Message::InvalidIdentifierFormat) => "Please enter a valid phone number or email address.",
        (Locale::En, Message::InvalidCodeFormat) => "Please enter the code exactly as you received it.",
        (Locale::En, Message::Unavailable) => "The service is temporarily unavailable. Please try again.",
        (Locale::En, Message::Unauthorized) => "Please sign in again.",
        (Locale::En, Message::CodeSms) => "Your KaramSaathi verification code is {code}. Do not share it with anyone.",

        (Locale::Hi, Message::RateLimited) => "बहुत अधिक अनुरोध। कृपया {n} सेकंड बाद पुनः प्रयास करें।",
        (Locale::Hi, Message::DeliveryFailed) => "हम आपका कोड नहीं भेज सके। कृपया थोड़ी देर बाद पुनः प्रयास करें।",
        (Locale::Hi, Message::NotFound) => "इस नंबर या ईमेल के लिए कोई कोड नहीं माँगा गया। कृपया नया कोड माँगें।",
        (Locale::Hi, Message::Expired) => "यह कोड समाप्त हो गया है। कृपया नया कोड माँगें।",
        (Locale::Hi, Message::AlreadyUsed) => "यह कोड पहले ही उपयोग हो चुका है। कृपया नया कोड माँगें।",
        (Locale::Hi, Message::TooManyAttempts) => "बहुत अधिक गलत प्रयास। कृपया नया कोड माँगें।",
        (Locale::Hi, Message::InvalidCode) => "गलत कोड। {n} प्रयास शेष हैं।",
        (Locale::Hi, Message::InvalidIdentifierFormat) => "कृपया मान्य फ़ोन नंबर या ईमेल पता दर्ज करें।",
        (Locale::Hi, Message::InvalidCodeFormat) => "कृपया कोड ठीक वैसे ही दर्ज करें जैसा प्राप्त हुआ।",
        (Locale::Hi, Message::Unavailable) => "सेवा अस्थायी रूप से उपलब्ध नहीं है। कृपया पुनः प्रयास करें।",
        (Locale::Hi, Message::Unauthorized) => "कृपया फिर से साइन इन करें।",
        (Locale::Hi, Message::CodeSms) => "आपका KaramSaathi सत्यापन कोड {code} है। इसे किसी के साथ साझा न करें।",

        (Locale::Mr, Message::RateLimited) => "खूप विनंत्या. कृपया {n} सेकंदांनंतर पुन्हा प्रयत्न करा.",
        (Locale::Mr, Message::DeliveryFailed) => "आम्ही तुमचा कोड पाठवू शकलो नाही. कृपया थोड्या वेळाने पुन्हा प्रयत्न करा.",
        (Locale::Mr, Message::NotFound) => "या नंबर किंवा ईमेलसाठी कोणताही कोड मागवलेला नाही. कृपया नवीन कोड मागवा.",
        (Locale::Mr, Message::Expired) => "हा कोड कालबाह्य झाला आहे. कृपया नवीन कोड मागवा.",
        (Locale::Mr, Message::AlreadyUsed) => "हा कोड आधीच वापरला गेला आहे. कृपया नवीन कोड मागवा.",
        (Locale::Mr, Message::TooManyAttempts) => "खूप चुकीचे प्रयत्न. कृपया नवीन कोड मागवा.",
        (Locale::Mr, Message::InvalidCode) => "चुकीचा कोड. {n} प्रयत्न शिल्लक आहेत.",
        (Locale::Mr, Message::InvalidIdentifierFormat) => "कृपया वैध फोन नंबर किंवा ईमेल पत्ता प्रविष्ट करा.",
        (Locale::Mr, Message::InvalidCodeFormat) => "कृपया मिळालेला कोड जसाच्या तसा प्रविष्ट करा.",
        (Locale::Mr, Message::Unavailable) => "सेवा तात्पुरती उपलब्ध नाही. कृपया पुन्हा प्रयत्न करा.",
        (Locale::Mr, Message::Unauthorized) => "कृपया पुन्हा साइन इन करा.",
        (Locale::Mr, Message::CodeSms) => "तुमचा KaramSaathi पडताळणी कोड {code} आहे. तो कोणालाही सांगू नका.",

        (Locale::Ta, Message::RateLimited) => "அதிகமான கோரிக்கைகள். {n} விநாடிகளுக்குப் பிறகு மீண்டும் முயற்சிக்கவும்.",
        (Locale::Ta, Message::DeliveryFailed) => "உங்கள் குறியீட்டை அனுப்ப முடியவில்லை. சிறிது நேரம் கழித்து மீண்டும் முயற்சிக்கவும்.",
        (Locale::Ta, Message::NotFound) => "இந்த எண் அல்லது மின்னஞ்சலுக்கு எந்தக் குறியீடும் கோரப்படவில்லை. புதிய குறியீட்டைக் கோரவும்.",
        (Locale::Ta, Message::Expired) => "இந்தக் குறியீடு காலாவதியாகிவிட்டது. புதிய குறியீட்டைக் கோரவும்.",
        (Locale::Ta, Message::AlreadyUsed) => "இந்தக் குறியீடு ஏற்கனவே பயன்படுத்தப்பட்டது. புதிய குறியீட்டைக் கோரவும்.",
        (Locale::Ta, Message::TooManyAttempts) => "அதிகமான தவறான முயற்சிகள். புதிய குறியீட்டைக் கோரவும்.",
        (Locale::Ta, Message::InvalidCode) => "தவறான குறியீடு. இன்னும் {n} முயற்சிகள் உள்ளன.",
        (Locale::Ta, Message::InvalidIdentifierFormat) => "சரியான தொலைபேசி எண் அல்லது மின்னஞ்சல் முகவரியை உள்ளிடவும்.",
        (Locale::Ta, Message::InvalidCodeFormat) => "பெற்ற குறியீட்டை அப்படியே உள்ளிடவும்.",
        (Locale::Ta, Message::Unavailable) => "சேவை தற்காலிகமாகக் கிடைக்கவில்லை. மீண்டும் முயற்சிக்கவும்.",
        (Locale::Ta, Message::Unauthorized) => "மீண்டும் உள்நுழையவும்.",
        (Locale::Ta, Message::CodeSms) => "உங்கள் KaramSaathi சரிபார்ப்புக் குறியீடு {code}. இதை யாருடனும் பகிர வேண்டாம்.",
    }
}

/// Localized, user-facing text for a protocol error.
#[must_use]
pub fn error_message(locale: Locale, error: &OtpError) -> String {
    let text = template(locale, Message::from(error));
    match error {
        OtpError::RateLimited {
            retry_after_seconds,
        } => text.replace("{n}", &retry_after_seconds.to_string()),
        OtpError::InvalidCode { attempts_remaining } => {
            text.replace("{n}", &attempts_remaining.to_string())
        }
        _ => text.to_string(),
    }
}

/// Body of the message carrying a one-time code.
#[must_use]
pub fn code_message(locale: Locale, code: &str) -> String {
    template(locale, Message::CodeSms).replace("{code}", code)
}
