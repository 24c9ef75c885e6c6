//! Route lookup against the routing service and persistence of the route files.
use crate::config::RouteConfig;
use crate::error::{FetchError, Outcome};
use crate::http::HttpTransport;
use crate::utils::parsing::ParsingUtils;
use log::{debug, info};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const WAY_DIR: &str = "way";
const FILE_DIR: &str = "file";
/// `xt` value the service uses for the text way file
const WAY_FORMAT: &str = "FSINN";

/// Simulator target for the FMS file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Platform {
    #[default]
    XPlane12,
    XPlane11,
    XPlane10,
    Pmdg,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::XPlane12,
        Platform::XPlane11,
        Platform::XPlane10,
        Platform::Pmdg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::XPlane12 => "XPLANE12",
            Platform::XPlane11 => "XPLANE11",
            Platform::XPlane10 => "XPLANE10",
            Platform::Pmdg => "PMDG",
        }
    }

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|p| *p == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        let index = Self::ALL.iter().position(|p| *p == self).unwrap_or(0);
        Self::ALL[(index + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FetchError::InvalidInput(format!("Unsupported platform: {}", s)))
    }
}

/// A validated route lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteRequest {
    departure: String,
    arrival: String,
    platform: Platform,
}

impl RouteRequest {
    /// Trims and upper-cases both codes, then checks they are ICAO codes.
    pub fn new(departure: &str, arrival: &str, platform: Platform) -> Outcome<Self> {
        let departure = departure.trim().to_uppercase();
        let arrival = arrival.trim().to_uppercase();

        if departure.is_empty() || arrival.is_empty() {
            return Err(FetchError::InvalidInput(
                "Please enter both the departure and arrival ICAO codes".to_string(),
            ));
        }
        if !ParsingUtils::is_icao_code(&departure) || !ParsingUtils::is_icao_code(&arrival) {
            return Err(FetchError::InvalidInput(
                "ICAO codes must be exactly 4 letters".to_string(),
            ));
        }

        Ok(Self {
            departure,
            arrival,
            platform,
        })
    }

    pub fn departure(&self) -> &str {
        &self.departure
    }

    pub fn arrival(&self) -> &str {
        &self.arrival
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn way_file_name(&self) -> String {
        format!("{}-{}-{}.spf", self.departure, self.arrival, WAY_FORMAT)
    }

    pub fn fms_file_name(&self) -> String {
        format!("{}-{}-{}.fms", self.departure, self.arrival, self.platform)
    }

    pub fn display_file_name(&self) -> String {
        format!("{}{}.fms", self.departure, self.arrival)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteResult {
    pub airway_text: String,
    pub file_path: PathBuf,
    pub display_file_name: String,
}

/// The two download URLs for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteUrls {
    pub way: String,
    pub fms: String,
}

impl RouteUrls {
    pub fn build(base_url: &str, cycle: &str, request: &RouteRequest) -> Self {
        let url_for = |xt: &str| {
            format!(
                "{}?dep={}&arr={}&xt={}&b=AIRAC{}",
                base_url, request.departure, request.arrival, xt, cycle
            )
        };
        Self {
            way: url_for(WAY_FORMAT),
            fms: url_for(request.platform.as_str()),
        }
    }
}

pub struct RouteFetcher<T: HttpTransport> {
    transport: Arc<T>,
    base_url: String,
    cycle: String,
    output_dir: PathBuf,
}

impl<T: HttpTransport> RouteFetcher<T> {
    pub fn new(transport: Arc<T>, config: &RouteConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.clone(),
            cycle: config.airac_cycle.clone(),
            output_dir: config.output_dir.clone(),
        }
    }

    pub fn way_dir(&self) -> PathBuf {
        self.output_dir.join(WAY_DIR)
    }

    pub fn file_dir(&self) -> PathBuf {
        self.output_dir.join(FILE_DIR)
    }

    /// Download the way file, pull the route out of it, then download the FMS file.
    ///
    /// If the way file carries no route, it is left on disk and the FMS file is not
    /// requested.
    ///
    /// `cancel` interrupts the downloads only. A file write that has started always
    /// finishes before this returns, so once the future completes nothing is left
    /// touching the route files.
    pub async fn fetch(
        &self,
        request: &RouteRequest,
        cancel: &CancellationToken,
    ) -> Outcome<RouteResult> {
        let urls = RouteUrls::build(&self.base_url, &self.cycle, request);
        let way_dir = self.way_dir();
        let file_dir = self.file_dir();
        create_dir(&way_dir).await?;
        create_dir(&file_dir).await?;

        let way_path = way_dir.join(request.way_file_name());
        let body = self.download(&urls.way, cancel).await?;
        write_file(&way_path, &body).await?;
        debug!("Saved way file {} ({} bytes)", way_path.display(), body.len());

        let raw = tokio::fs::read(&way_path)
            .await
            .map_err(|e| FetchError::filesystem(&way_path, e))?;
        let airway_text = ParsingUtils::extract_airway(&String::from_utf8_lossy(&raw));
        if airway_text.is_empty() {
            return Err(FetchError::RouteNotFound {
                departure: request.departure.clone(),
                arrival: request.arrival.clone(),
            });
        }

        let file_path = file_dir.join(request.fms_file_name());
        let body = self.download(&urls.fms, cancel).await?;
        write_file(&file_path, &body).await?;

        info!(
            "Route {} → {} ({}) saved to {}",
            request.departure,
            request.arrival,
            request.platform,
            file_path.display()
        );

        Ok(RouteResult {
            airway_text,
            file_path,
            display_file_name: request.display_file_name(),
        })
    }

    async fn download(&self, url: &str, cancel: &CancellationToken) -> Outcome<Vec<u8>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            body = self.transport.get(url) => body,
        }
    }
}

async fn create_dir(path: &Path) -> Outcome<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| FetchError::filesystem(path, e))
}

async fn write_file(path: &Path, contents: &[u8]) -> Outcome<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| FetchError::filesystem(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::mock::{MockTransport, Reply};

    const WAY_FIXTURE: &str = "[FSINN]\nDEP=ZBAA\nARR=ZSPD\nROUTE=XPEK W40 YQGX\nEND\n";
    const EMPTY_WAY_FIXTURE: &str = "[FSINN]\nDEP=ZBAA\nARR=ZSPD\nROUTE=\"\"\nEND\n";

    fn route_fetcher(
        transport: MockTransport,
        dir: &Path,
    ) -> (RouteFetcher<MockTransport>, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        let config = RouteConfig {
            base_url: "https://routes.test/api.php".to_string(),
            airac_cycle: "2506".to_string(),
            output_dir: dir.to_path_buf(),
        };
        (RouteFetcher::new(transport.clone(), &config), transport)
    }

    fn zbaa_zspd() -> RouteRequest {
        RouteRequest::new("ZBAA", "ZSPD", Platform::XPlane12).unwrap()
    }

    #[test]
    fn test_urls_embed_codes_cycle_and_platform() {
        for platform in Platform::ALL {
            let request = RouteRequest::new("egll", " kjfk ", platform).unwrap();
            let urls = RouteUrls::build("https://routes.test/api.php", "2506", &request);
            assert_eq!(
                urls.way,
                "https://routes.test/api.php?dep=EGLL&arr=KJFK&xt=FSINN&b=AIRAC2506"
            );
            assert_eq!(
                urls.fms,
                format!(
                    "https://routes.test/api.php?dep=EGLL&arr=KJFK&xt={}&b=AIRAC2506",
                    platform.as_str()
                )
            );
        }
    }

    #[test]
    fn test_request_validation() {
        let err = RouteRequest::new("", "ZSPD", Platform::default()).unwrap_err();
        assert!(err.to_string().contains("Please enter both"));
        let err = RouteRequest::new("ZBA", "ZSPD", Platform::default()).unwrap_err();
        assert!(err.to_string().contains("4 letters"));
        assert_eq!(err.kind(), ErrorKind::Rejected);

        let request = RouteRequest::new(" zbaa", "zspd ", Platform::Pmdg).unwrap();
        assert_eq!(request.departure(), "ZBAA");
        assert_eq!(request.fms_file_name(), "ZBAA-ZSPD-PMDG.fms");
        assert_eq!(request.way_file_name(), "ZBAA-ZSPD-FSINN.spf");
        assert_eq!(request.display_file_name(), "ZBAAZSPD.fms");
    }

    #[test]
    fn test_platform_parsing_and_cycling() {
        assert_eq!("xplane11".parse::<Platform>().unwrap(), Platform::XPlane11);
        assert_eq!("PMDG".parse::<Platform>().unwrap(), Platform::Pmdg);
        assert!("MSFS".parse::<Platform>().is_err());
        assert_eq!(Platform::Pmdg.next(), Platform::XPlane12);
        assert_eq!(Platform::XPlane12.previous(), Platform::Pmdg);
    }

    #[tokio::test]
    async fn test_fetch_saves_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockTransport::new()
            .on_text("xt=FSINN", WAY_FIXTURE)
            .on_text("xt=XPLANE12", "I\n1100 Version\nCYCLE 2506\n");
        let (fetcher, transport) = route_fetcher(mock, dir.path());

        let result = fetcher.fetch(&zbaa_zspd(), &CancellationToken::new()).await.unwrap();

        assert_eq!(result.airway_text, "PEK W40 YQG");
        assert_eq!(result.display_file_name, "ZBAAZSPD.fms");
        assert_eq!(result.file_path, dir.path().join("file").join("ZBAA-ZSPD-XPLANE12.fms"));
        assert_eq!(
            std::fs::read_to_string(&result.file_path).unwrap(),
            "I\n1100 Version\nCYCLE 2506\n"
        );
        assert!(dir.path().join("way").join("ZBAA-ZSPD-FSINN.spf").exists());

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].url.contains("xt=FSINN"));
        assert!(calls[1].url.contains("xt=XPLANE12"));
    }

    #[tokio::test]
    async fn test_empty_route_skips_second_download() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockTransport::new()
            .on_text("xt=FSINN", EMPTY_WAY_FIXTURE)
            .on_text("xt=XPLANE12", "should not be fetched");
        let (fetcher, transport) = route_fetcher(mock, dir.path());

        let err = fetcher.fetch(&zbaa_zspd(), &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DataNotFound);
        assert_eq!(transport.calls().len(), 1);
        assert!(dir.path().join("way").join("ZBAA-ZSPD-FSINN.spf").exists());
        assert!(!dir.path().join("file").join("ZBAA-ZSPD-XPLANE12.fms").exists());
        assert!(dir.path().join("file").is_dir());
    }

    #[tokio::test]
    async fn test_repeated_request_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockTransport::new()
            .on_text("xt=FSINN", WAY_FIXTURE)
            .on_text("xt=XPLANE12", "fms body");
        let (fetcher, _) = route_fetcher(mock, dir.path());

        let first = fetcher.fetch(&zbaa_zspd(), &CancellationToken::new()).await.unwrap();
        let second = fetcher.fetch(&zbaa_zspd(), &CancellationToken::new()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read_dir(dir.path().join("file")).unwrap().count(), 1);
        assert_eq!(std::fs::read_dir(dir.path().join("way")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_http_failure_on_way_file() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockTransport::new().on("xt=FSINN", Reply::Status(502));
        let (fetcher, transport) = route_fetcher(mock, dir.path());

        let err = fetcher.fetch(&zbaa_zspd(), &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.to_string().contains("502"));
        assert_eq!(transport.calls().len(), 1);
        assert!(!dir.path().join("way").join("ZBAA-ZSPD-FSINN.spf").exists());
    }

    #[tokio::test]
    async fn test_unwritable_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let mock = MockTransport::new().on_text("xt=FSINN", WAY_FIXTURE);
        let (fetcher, transport) = route_fetcher(mock, &blocker);

        let err = fetcher.fetch(&zbaa_zspd(), &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Filesystem);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_fetch_stops_before_downloading() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockTransport::new()
            .on_text("xt=FSINN", WAY_FIXTURE)
            .on_text("xt=XPLANE12", "fms");
        let (fetcher, transport) = route_fetcher(mock, dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetcher.fetch(&zbaa_zspd(), &cancel).await.unwrap_err();

        assert!(matches!(err, FetchError::Cancelled));
        assert!(transport.calls().is_empty());
        assert!(!dir.path().join("way").join("ZBAA-ZSPD-FSINN.spf").exists());
    }
}
