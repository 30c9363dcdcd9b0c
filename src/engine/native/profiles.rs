//! Browser profiles and the default request headers each one sends.

/// Profile used when a request names none.
pub const DEFAULT_PROFILE: &str = "chrome_142";

/// Every profile id the native engine accepts, in display order.
pub static PROFILES: &[&str] = &[
    "chrome_100",
    "chrome_101",
    "chrome_104",
    "chrome_105",
    "chrome_106",
    "chrome_107",
    "chrome_108",
    "chrome_109",
    "chrome_110",
    "chrome_114",
    "chrome_116",
    "chrome_117",
    "chrome_118",
    "chrome_119",
    "chrome_120",
    "chrome_123",
    "chrome_124",
    "chrome_126",
    "chrome_127",
    "chrome_128",
    "chrome_129",
    "chrome_130",
    "chrome_131",
    "chrome_132",
    "chrome_133",
    "chrome_134",
    "chrome_135",
    "chrome_136",
    "chrome_137",
    "chrome_138",
    "chrome_139",
    "chrome_140",
    "chrome_141",
    "chrome_142",
    "edge_101",
    "edge_122",
    "edge_127",
    "edge_131",
    "edge_134",
    "safari_ios_17_2",
    "safari_ios_17_4_1",
    "safari_ios_16_5",
    "safari_15_3",
    "safari_15_5",
    "safari_15_6_1",
    "safari_16",
    "safari_16_5",
    "safari_17_0",
    "safari_17_2_1",
    "safari_17_4_1",
    "safari_17_5",
    "safari_18",
    "safari_ipad_18",
    "safari_18_2",
    "safari_ios_18_1_1",
    "safari_18_3",
    "safari_18_3_1",
    "safari_18_5",
    "firefox_109",
    "firefox_117",
    "firefox_128",
    "firefox_133",
    "firefox_135",
    "firefox_private_135",
    "firefox_android_135",
    "firefox_136",
    "firefox_private_136",
    "firefox_139",
    "opera_116",
    "opera_117",
    "opera_118",
    "opera_119",
    "okhttp_3_9",
    "okhttp_3_11",
    "okhttp_3_13",
    "okhttp_3_14",
    "okhttp_4_9",
    "okhttp_4_10",
    "okhttp_4_12",
    "okhttp_5",
];

/// Browser family, which decides the header set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Chrome,
    Edge,
    Opera,
    Safari,
    SafariIos,
    SafariIpad,
    Firefox,
    FirefoxAndroid,
    OkHttp,
}

/// A parsed profile id such as `safari_ios_17_4_1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: &'static str,
    pub family: Family,
    /// Dotted version, e.g. `17.4.1`.
    pub version: String,
}

impl Profile {
    /// Look up a supported profile by id.
    pub fn find(id: &str) -> Option<Self> {
        let id = *PROFILES.iter().find(|p| **p == id)?;
        let mut parts = id.split('_').peekable();

        let family = match parts.next()? {
            "chrome" => Family::Chrome,
            "edge" => Family::Edge,
            "opera" => Family::Opera,
            "okhttp" => Family::OkHttp,
            "safari" => match parts.peek().copied() {
                Some("ios") => {
                    parts.next();
                    Family::SafariIos
                }
                Some("ipad") => {
                    parts.next();
                    Family::SafariIpad
                }
                _ => Family::Safari,
            },
            "firefox" => match parts.peek().copied() {
                Some("android") => {
                    parts.next();
                    Family::FirefoxAndroid
                }
                // Private browsing sends the same headers.
                Some("private") => {
                    parts.next();
                    Family::Firefox
                }
                _ => Family::Firefox,
            },
            _ => return None,
        };

        let version = parts.collect::<Vec<_>>().join(".");
        Some(Self {
            id,
            family,
            version,
        })
    }

    /// Major version number.
    pub fn major(&self) -> u16 {
        self.version
            .split('.')
            .next()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn user_agent(&self) -> String {
        let v = &self.version;
        match self.family {
            Family::Chrome => format!(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{v}.0.0.0 Safari/537.36"
            ),
            Family::Edge => format!(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{v}.0.0.0 Safari/537.36 Edg/{v}.0.0.0"
            ),
            Family::Opera => format!(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 Safari/537.36 OPR/{v}.0.0.0",
                self.chromium_major()
            ),
            Family::Safari => format!(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{v} Safari/605.1.15"
            ),
            Family::SafariIos => format!(
                "Mozilla/5.0 (iPhone; CPU iPhone OS {} like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{v} Mobile/15E148 Safari/604.1",
                v.replace('.', "_")
            ),
            Family::SafariIpad => format!(
                "Mozilla/5.0 (iPad; CPU OS {} like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{v} Mobile/15E148 Safari/604.1",
                v.replace('.', "_")
            ),
            Family::Firefox => format!(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:{v}.0) Gecko/20100101 Firefox/{v}.0"
            ),
            Family::FirefoxAndroid => format!(
                "Mozilla/5.0 (Android 13; Mobile; rv:{v}.0) Gecko/{v}.0 Firefox/{v}.0"
            ),
            Family::OkHttp => format!("okhttp/{v}"),
        }
    }

    /// Chromium major version the profile is built on.
    fn chromium_major(&self) -> u16 {
        match self.family {
            // Opera trails Chromium by 15 major versions.
            Family::Opera => self.major() + 15,
            _ => self.major(),
        }
    }

    fn is_chromium(&self) -> bool {
        matches!(self.family, Family::Chrome | Family::Edge | Family::Opera)
    }

    /// Default headers in the order the browser sends them.
    pub fn default_headers(&self) -> Vec<(&'static str, String)> {
        if self.family == Family::OkHttp {
            return vec![("User-Agent", self.user_agent())];
        }

        let mut headers = Vec::with_capacity(6);
        if self.is_chromium() {
            let brand = match self.family {
                Family::Edge => "edge",
                Family::Opera => "opera",
                _ => "chrome",
            };
            headers.push((
                "sec-ch-ua",
                generate_sec_ch_ua(brand, self.chromium_major(), self.major()),
            ));
            headers.push(("sec-ch-ua-mobile", "?0".to_string()));
            headers.push(("sec-ch-ua-platform", "\"Windows\"".to_string()));
            headers.push(("Upgrade-Insecure-Requests", "1".to_string()));
            headers.push(("User-Agent", self.user_agent()));
            headers.push((
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"
                    .to_string(),
            ));
            headers.push(("Accept-Language", "en-US,en;q=0.9".to_string()));
            return headers;
        }

        headers.push(("User-Agent", self.user_agent()));
        headers.push((
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        ));
        let language = match self.family {
            Family::Firefox | Family::FirefoxAndroid => "en-US,en;q=0.5",
            _ => "en-US,en;q=0.9",
        };
        headers.push(("Accept-Language", language.to_string()));
        headers
    }
}

/// Build a `Sec-CH-UA` value for a Chromium-family browser.
pub fn generate_sec_ch_ua(browser: &str, chromium: u16, version: u16) -> String {
    let brand = match browser {
        "edge" => format!("\"Microsoft Edge\";v=\"{version}\""),
        "opera" => format!("\"Opera\";v=\"{version}\""),
        _ => format!("\"Google Chrome\";v=\"{version}\""),
    };
    format!("\"Chromium\";v=\"{chromium}\", {brand}, \"Not-A.Brand\";v=\"99\"")
}
