use crate::analysis::DateRange;
use crate::error::{DashboardError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Columns every event table must provide
pub const REQUIRED_COLUMNS: [&str; 13] = [
    "event_date",
    "event_type",
    "sub_event_type",
    "country",
    "admin1",
    "actor1",
    "actor2",
    "source",
    "latitude",
    "longitude",
    "fatalities",
    "notes",
    "event_id_cnty",
];

/// A single reported conflict incident
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: String,
    pub event_date: NaiveDate,
    /// Epoch seconds of the event day at 00:00 UTC
    pub timestamp: i64,
    pub event_type: String,
    pub sub_event_type: String,
    pub country: String,
    pub admin1: String,
    pub actor1: String,
    pub actor2: String,
    pub source: String,
    pub latitude: f64,
    pub longitude: f64,
    pub fatalities: u32,
    pub notes: String,
}

/// Epoch seconds at the start of `date`
pub fn day_timestamp(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Immutable set of events. Clones share the underlying records.
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    rows: Vec<Arc<EventRecord>>,
}

impl EventTable {
    /// Build a table, keeping the first row for any repeated identifier
    pub fn new(records: Vec<EventRecord>) -> Self {
        let mut seen = HashSet::with_capacity(records.len());
        let mut rows = Vec::with_capacity(records.len());
        let mut duplicates = 0usize;

        for record in records {
            if seen.insert(record.id.clone()) {
                rows.push(Arc::new(record));
            } else {
                duplicates += 1;
            }
        }

        if duplicates > 0 {
            log::warn!("dropped {} events with duplicate identifiers", duplicates);
        }

        Self { rows }
    }

    /// Wrap rows already known to be unique (e.g. a subset of another table)
    pub(crate) fn from_shared(rows: Vec<Arc<EventRecord>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Arc<EventRecord>] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EventRecord>> {
        self.rows.iter()
    }

    /// Inclusive day range covered by the table
    pub fn date_extent(&self) -> Option<DateRange> {
        let first = self.rows.first()?.event_date;
        let (start, end) = self
            .rows
            .iter()
            .fold((first, first), |(lo, hi), r| (lo.min(r.event_date), hi.max(r.event_date)));
        DateRange::new(start, end).ok()
    }

    /// Geographic bounding box as (min_lon, min_lat, max_lon, max_lat)
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let first = self.rows.first()?;
        let init = (first.longitude, first.latitude, first.longitude, first.latitude);
        Some(self.rows.iter().fold(init, |(x0, y0, x1, y1), r| {
            (
                x0.min(r.longitude),
                y0.min(r.latitude),
                x1.max(r.longitude),
                y1.max(r.latitude),
            )
        }))
    }
}

/// First event date of each calendar year, ascending
pub fn year_marks(table: &EventTable) -> Vec<NaiveDate> {
    let mut firsts: BTreeMap<i32, NaiveDate> = BTreeMap::new();
    for row in table.iter() {
        firsts
            .entry(row.event_date.year())
            .and_modify(|d| *d = (*d).min(row.event_date))
            .or_insert(row.event_date);
    }
    firsts.into_values().collect()
}

/// Where a dataset lives: a local cache file, optionally backed by a remote copy
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatasetSource {
    pub name: String,
    pub cache_path: PathBuf,
    #[serde(default)]
    pub url: Option<String>,
}

/// Load a dataset, fetching and caching it first if only the remote copy exists
pub fn load_dataset(source: &DatasetSource) -> Result<EventTable> {
    let path = &source.cache_path;
    let table = if path.exists() {
        read_event_csv(path)?
    } else {
        let Some(url) = source.url.as_deref() else {
            return Err(DashboardError::MissingSource { path: path.clone() });
        };
        fetch_to_cache(url, path)?
    };

    if table.is_empty() {
        return Err(DashboardError::EmptyDataset(source.name.clone()));
    }
    log::info!("loaded {} events for `{}` from {}", table.len(), source.name, path.display());
    Ok(table)
}

/// Download `url`, parse it, and only then move it into place at `path`.
/// A body that is not an event table never reaches the cache.
fn fetch_to_cache(url: &str, path: &Path) -> Result<EventTable> {
    log::info!("fetching {} into {}", url, path.display());

    let fetch_err = |source| DashboardError::Fetch {
        url: url.to_string(),
        source,
    };
    let body = reqwest::blocking::get(url)
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.bytes())
        .map_err(fetch_err)?;

    let table = parse_event_csv(Cursor::new(&body[..]), path)?;
    if table.is_empty() {
        log::warn!("{} returned no usable events; not caching", url);
        return Ok(table);
    }

    let io_err = |source| DashboardError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_err)?;

    // Write beside the target and rename, so readers never see a partial file
    let mut staged = NamedTempFile::new_in(dir).map_err(io_err)?;
    staged.write_all(&body).map_err(io_err)?;
    staged.persist(path).map_err(|e| io_err(e.error))?;

    log::info!("cached {} bytes at {}", body.len(), path.display());
    Ok(table)
}

/// Read an event table from a delimited file
pub fn read_event_csv(path: &Path) -> Result<EventTable> {
    let file = File::open(path).map_err(|source| DashboardError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_event_csv(file, path)
}

/// Raw row as it appears in the file; numeric fields are parsed afterwards
/// so a bad cell drops one row instead of the whole table.
#[derive(Debug, Deserialize)]
struct RawEvent {
    event_id_cnty: String,
    event_date: String,
    event_type: String,
    sub_event_type: String,
    country: String,
    admin1: String,
    actor1: String,
    actor2: String,
    source: String,
    latitude: String,
    longitude: String,
    fatalities: String,
    notes: String,
}

impl RawEvent {
    fn into_record(self) -> Option<EventRecord> {
        let event_date = parse_event_date(&self.event_date)?;
        let latitude = self.latitude.parse::<f64>().ok().filter(|v| v.is_finite())?;
        let longitude = self.longitude.parse::<f64>().ok().filter(|v| v.is_finite())?;
        let fatalities = parse_fatalities(&self.fatalities)?;

        Some(EventRecord {
            id: self.event_id_cnty,
            timestamp: day_timestamp(event_date),
            event_date,
            event_type: self.event_type,
            sub_event_type: self.sub_event_type,
            country: self.country,
            admin1: self.admin1,
            actor1: self.actor1,
            actor2: self.actor2,
            source: self.source,
            latitude,
            longitude,
            fatalities,
            notes: self.notes,
        })
    }
}

/// Parse an event table from any reader. `origin` is only used in errors.
pub fn parse_event_csv<R: Read>(reader: R, origin: &Path) -> Result<EventTable> {
    let csv_err = |source| DashboardError::Csv {
        path: origin.to_path_buf(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().map_err(csv_err)?.clone();
    if let Some(column) = REQUIRED_COLUMNS
        .iter()
        .find(|c| !headers.iter().any(|h| h == **c))
    {
        return Err(DashboardError::MissingColumn {
            path: origin.to_path_buf(),
            column: *column,
        });
    }

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for row in rdr.deserialize::<RawEvent>() {
        let raw = match row {
            Ok(raw) => raw,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(csv_err(e)),
            Err(e) => {
                // Ragged or undecodable record
                log::debug!("{}: skipping record: {}", origin.display(), e);
                dropped += 1;
                continue;
            }
        };
        match raw.into_record() {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        log::warn!(
            "{}: dropped {} malformed rows or rows with unparseable date, coordinates or fatalities",
            origin.display(),
            dropped
        );
    }

    Ok(EventTable::new(records))
}

/// Accepts `2023-01-31`, `31 January 2023` and a date with a time suffix
pub fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d %B %Y"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .ok()
}

fn parse_fatalities(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0);
    }
    raw.parse::<u32>().ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    const HEADER: &str = "event_id_cnty,event_date,event_type,sub_event_type,country,admin1,actor1,actor2,source,latitude,longitude,fatalities,notes";

    pub(crate) fn record(id: &str, date: &str, fatalities: u32) -> EventRecord {
        let event_date = parse_event_date(date).expect("test date");
        EventRecord {
            id: id.to_string(),
            event_date,
            timestamp: day_timestamp(event_date),
            event_type: "Battles".to_string(),
            sub_event_type: "Armed clash".to_string(),
            country: "Ukraine".to_string(),
            admin1: "Donetsk".to_string(),
            actor1: String::new(),
            actor2: String::new(),
            source: "Source A".to_string(),
            latitude: 48.0,
            longitude: 37.8,
            fatalities,
            notes: String::new(),
        }
    }

    fn parse(body: &str) -> Result<EventTable> {
        let text = format!("{}\n{}", HEADER, body);
        parse_event_csv(Cursor::new(text), Path::new("test.csv"))
    }

    #[test]
    fn test_parse_rows() {
        let table = parse(
            "UKR1,2023-01-01,Battles,Armed clash,Ukraine,Donetsk,Military Forces of Ukraine,,Ukrinform,48.0,37.8,0,\"quiet, then shelling\"\n\
             UKR2,02 January 2023,Explosions/Remote violence,Shelling/artillery/missile attack,Ukraine,Kharkiv,Military Forces of Russia,,Suspilne,49.9,36.2,5,",
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        let second = &table.rows()[1];
        assert_eq!(second.event_date, NaiveDate::from_ymd_opt(2023, 1, 2).unwrap());
        assert_eq!(second.timestamp, 1_672_617_600);
        assert_eq!(second.fatalities, 5);
        assert_eq!(table.rows()[0].notes, "quiet, then shelling");
    }

    #[test]
    fn test_missing_column_is_reported() {
        let text = "event_id_cnty,event_date\nUKR1,2023-01-01\n";
        let err = parse_event_csv(Cursor::new(text), Path::new("short.csv")).unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn { column: "event_type", .. }));
    }

    #[test]
    fn test_unparseable_rows_are_dropped() {
        let table = parse(
            "UKR1,not a date,Battles,Armed clash,Ukraine,Donetsk,,,S,48.0,37.8,0,\n\
             UKR2,2023-01-02,Battles,Armed clash,Ukraine,Donetsk,,,S,north,37.8,0,\n\
             UKR3,2023-01-03,Battles,Armed clash,Ukraine,Donetsk,,,S,48.0,37.8,-1,\n\
             UKR4,2023-01-04,Battles,Armed clash,Ukraine,Donetsk,,,S,48.0,37.8,2,",
        )
        .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].id, "UKR4");
    }

    #[test]
    fn test_ragged_rows_are_dropped() {
        let table = parse(
            "UKR1,2023-01-01,Battles,Armed clash,Ukraine,Donetsk,,,S,48.0,37.8,1,\n\
             UKR2,2023-01-02,Battles,Armed clash,Ukraine,Donetsk,,,S,48.0\n\
             UKR3,2023-01-03,Battles,Armed clash,Ukraine,Donetsk,,,S,48.0,37.8,2,",
        )
        .unwrap();
        let ids: Vec<&str> = table.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["UKR1", "UKR3"]);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let table = EventTable::new(vec![
            record("A", "2023-01-01", 1),
            record("A", "2023-01-02", 9),
            record("B", "2023-01-03", 0),
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].fatalities, 1);
    }

    #[test]
    fn test_extent_and_bounds() {
        let mut west = record("W", "2021-06-01", 0);
        west.longitude = 22.5;
        west.latitude = 48.6;
        let table = EventTable::new(vec![record("A", "2023-01-05", 0), west, record("C", "2022-03-01", 0)]);

        let extent = table.date_extent().unwrap();
        assert_eq!(extent.start(), NaiveDate::from_ymd_opt(2021, 6, 1).unwrap());
        assert_eq!(extent.end(), NaiveDate::from_ymd_opt(2023, 1, 5).unwrap());

        let (x0, y0, x1, y1) = table.bounds().unwrap();
        assert_eq!((x0, y0, x1, y1), (22.5, 48.0, 37.8, 48.6));
        assert!(EventTable::default().date_extent().is_none());
    }

    #[test]
    fn test_year_marks() {
        let table = EventTable::new(vec![
            record("A", "2021-03-04", 0),
            record("B", "2020-12-31", 0),
            record("C", "2021-01-02", 0),
            record("D", "2020-02-01", 0),
        ]);
        let marks = year_marks(&table);
        assert_eq!(
            marks,
            vec![
                NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2021, 1, 2).unwrap(),
            ]
        );
    }

    #[test]
    fn test_load_from_cache_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        writeln!(file, "UKR1,2023-01-01,Battles,Armed clash,Ukraine,Donetsk,,,S,48.0,37.8,3,").unwrap();
        file.flush().unwrap();

        let source = DatasetSource {
            name: "cached".to_string(),
            cache_path: file.path().to_path_buf(),
            url: None,
        };
        let table = load_dataset(&source).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_missing_source_without_url() {
        let dir = tempfile::tempdir().unwrap();
        let source = DatasetSource {
            name: "absent".to_string(),
            cache_path: dir.path().join("nothing.csv"),
            url: None,
        };
        assert!(matches!(
            load_dataset(&source),
            Err(DashboardError::MissingSource { .. })
        ));
    }

    #[test]
    fn test_header_only_file_is_empty_dataset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        file.flush().unwrap();

        let source = DatasetSource {
            name: "hollow".to_string(),
            cache_path: file.path().to_path_buf(),
            url: None,
        };
        assert!(matches!(load_dataset(&source), Err(DashboardError::EmptyDataset(_))));
    }

    /// Serve one HTTP response on a local port and return its url
    fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }
            write!(
                stream,
                "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            )
            .unwrap();
        });
        format!("http://{}/events.csv", addr)
    }

    #[test]
    fn test_fetch_parses_then_caches() {
        const BODY: &str = "event_id_cnty,event_date,event_type,sub_event_type,country,admin1,actor1,actor2,source,latitude,longitude,fatalities,notes\n\
                            UKR1,2023-01-01,Battles,Armed clash,Ukraine,Donetsk,,,S,48.0,37.8,3,\n\
                            UKR2,2023-01-02,Shelling,Artillery,Ukraine,Kharkiv,,,S,49.9,36.2,0,\n";
        let dir = tempfile::tempdir().unwrap();
        let source = DatasetSource {
            name: "remote".to_string(),
            cache_path: dir.path().join("cache").join("events.csv"),
            url: Some(serve_once("200 OK", BODY)),
        };

        let table = load_dataset(&source).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(fs::read_to_string(&source.cache_path).unwrap(), BODY);

        // Second load reads the cache; the server is gone
        assert_eq!(load_dataset(&source).unwrap().len(), 2);
    }

    #[test]
    fn test_fetched_page_that_is_not_a_table_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let source = DatasetSource {
            name: "login page".to_string(),
            cache_path: dir.path().join("events.csv"),
            url: Some(serve_once("200 OK", "<html><body>Please sign in</body></html>")),
        };

        assert!(matches!(
            load_dataset(&source),
            Err(DashboardError::MissingColumn { .. })
        ));
        assert!(!source.cache_path.exists());
    }

    #[test]
    fn test_fetch_error_status_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = DatasetSource {
            name: "gone".to_string(),
            cache_path: dir.path().join("events.csv"),
            url: Some(serve_once("404 Not Found", "missing")),
        };

        assert!(matches!(load_dataset(&source), Err(DashboardError::Fetch { .. })));
        assert!(!source.cache_path.exists());
    }
}
