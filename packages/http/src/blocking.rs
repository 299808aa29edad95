use std::io::{self, Cursor, Read, Write};
use std::time::SystemTime;

use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, LAST_MODIFIED};
use http::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use url::Url;

use layerfs_core::{
    Error as FsError, FileInfo, FileSystem, FileWriter, FsPath, ReadStream, WriteMode,
    WriteStream,
};

use crate::error::Error;

/// A filesystem backed by a remote HTTP object store.
///
/// Paths map onto URLs below `base_url`:
/// - reads perform a `GET`
/// - `info` performs a `HEAD` (size from `Content-Length`, modified time
///   from `Last-Modified`)
/// - committed writes perform a `PUT` with the file body
/// - `rm` performs a `DELETE`
///
/// Object stores have no directories: `mkdir` succeeds without a request and
/// `ls` is unsupported.
///
/// # Example
///
/// ```ignore
/// use layerfs_http::HttpFs;
/// use layerfs_core::{fspath, FileSystem};
///
/// let fs = HttpFs::new("https://cdn.example.com/media/")?
///     .with_header("Authorization", "Bearer token")?;
///
/// fs.pipe(&fspath!("images/x.png"), &png_bytes)?;
/// assert_eq!(fs.url(&fspath!("images/x.png")).unwrap(),
///            "https://cdn.example.com/media/images/x.png");
/// ```
#[derive(Debug, Clone)]
pub struct HttpFs {
    client: Client,
    base_url: Url,
    headers: HeaderMap,
}

impl HttpFs {
    /// Create a new HTTP filesystem rooted at the given base URL
    pub fn new(base_url: &str) -> Result<Self, Error> {
        Self::with_client(Client::new(), base_url)
    }

    /// Create a new HTTP filesystem with a custom reqwest client
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl {
                message: format!("{} cannot be used as a base URL", base_url),
            });
        }

        Ok(Self {
            client,
            base_url,
            headers: HeaderMap::new(),
        })
    }

    /// Add a header that will be sent with every request
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the full URL from the base URL and a path.
    ///
    /// Components are percent-encoded as individual segments.
    fn build_url(&self, path: &FsPath) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl {
                message: format!("{} cannot be used as a base URL", self.base_url),
            })?
            .pop_if_empty()
            .extend(path.iter());
        Ok(url)
    }

    fn request(&self, method: http::Method, path: &FsPath) -> Result<RequestBuilder, Error> {
        let url = self.build_url(path)?;
        log::debug!("{} {}", method, url);
        Ok(self
            .client
            .request(method, url)
            .headers(self.headers.clone()))
    }

    fn send(&self, request: RequestBuilder, path: &FsPath) -> Result<Response, FsError> {
        let response = request.send().map_err(Error::from)?;
        check_status(response, path)
    }

    fn fetch(&self, path: &FsPath) -> Result<Vec<u8>, FsError> {
        let mut response = self.send(self.request(http::Method::GET, path)?, path)?;
        let mut buf = Vec::new();
        response.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn upload(&self, path: &FsPath, body: Vec<u8>) -> Result<(), FsError> {
        let request = self.request(http::Method::PUT, path)?.body(body);
        self.send(request, path)?;
        Ok(())
    }
}

/// Map an HTTP status onto the filesystem error vocabulary.
fn check_status(response: Response, path: &FsPath) -> Result<Response, FsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(FsError::not_found(path)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FsError::PermissionDenied {
            path: path.clone(),
            reason: format!("HTTP {}", status.as_u16()),
        }),
        _ => Err(Error::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        }
        .into()),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

impl FileSystem for HttpFs {
    fn open_read(&self, path: &FsPath) -> Result<ReadStream, FsError> {
        let response = self.send(self.request(http::Method::GET, path)?, path)?;
        Ok(Box::new(response))
    }

    fn open_write(&self, path: &FsPath, mode: WriteMode) -> Result<WriteStream, FsError> {
        if path.is_root() {
            return Err(FsError::IsADirectory { path: path.clone() });
        }

        let buffer = match mode {
            WriteMode::Truncate => Vec::new(),
            WriteMode::CreateNew if self.exists(path)? => {
                return Err(FsError::AlreadyExists { path: path.clone() })
            }
            WriteMode::CreateNew => Vec::new(),
            WriteMode::Append => match self.fetch(path) {
                Ok(existing) => existing,
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => return Err(e),
            },
        };

        Ok(Box::new(HttpWriter {
            fs: self.clone(),
            path: path.clone(),
            buffer: Cursor::new(buffer),
        }))
    }

    fn info(&self, path: &FsPath) -> Result<FileInfo, FsError> {
        if path.is_root() {
            return Ok(FileInfo::directory(""));
        }

        let response = self.send(self.request(http::Method::HEAD, path)?, path)?;
        let headers = response.headers();
        let size = header_str(headers, &CONTENT_LENGTH)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let modified = header_str(headers, &LAST_MODIFIED)
            .and_then(|v| chrono::DateTime::parse_from_rfc2822(v).ok())
            .map(SystemTime::from);

        Ok(FileInfo::file(path.name(), size).with_times(None, modified))
    }

    fn ls(&self, _path: &FsPath) -> Result<Vec<FileInfo>, FsError> {
        Err(FsError::Unsupported { operation: "ls" })
    }

    fn mkdir(&self, _path: &FsPath, _parents: bool) -> Result<(), FsError> {
        Ok(())
    }

    fn rm(&self, path: &FsPath, _recursive: bool) -> Result<(), FsError> {
        if path.is_root() {
            return Err(FsError::PermissionDenied {
                path: path.clone(),
                reason: "cannot remove the root directory".to_string(),
            });
        }
        self.send(self.request(http::Method::DELETE, path)?, path)?;
        Ok(())
    }

    fn mv(&self, from: &FsPath, to: &FsPath) -> Result<(), FsError> {
        let data = self.fetch(from)?;
        self.upload(to, data)?;
        self.rm(from, false)
    }

    fn url(&self, path: &FsPath) -> Option<String> {
        self.build_url(path).ok().map(String::from)
    }
}

/// Buffers the body and uploads it on commit.
struct HttpWriter {
    fs: HttpFs,
    path: FsPath,
    buffer: Cursor<Vec<u8>>,
}

impl Write for HttpWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.get_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileWriter for HttpWriter {
    fn commit(self: Box<Self>) -> Result<(), FsError> {
        let HttpWriter { fs, path, buffer } = *self;
        fs.upload(&path, buffer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerfs_core::fspath;

    #[test]
    fn urls_are_built_from_segments() {
        let fs = HttpFs::new("https://cdn.example.com/media/").unwrap();
        assert_eq!(
            fs.url(&fspath!("images/x.png")).unwrap(),
            "https://cdn.example.com/media/images/x.png"
        );

        let fs = HttpFs::new("https://cdn.example.com/media").unwrap();
        assert_eq!(
            fs.url(&fspath!("a b/c?d")).unwrap(),
            "https://cdn.example.com/media/a%20b/c%3Fd"
        );
    }

    #[test]
    fn invalid_base_url() {
        assert!(matches!(HttpFs::new("not a url"), Err(Error::UrlParse(_))));
        assert!(matches!(
            HttpFs::new("mailto:someone@example.com"),
            Err(Error::InvalidUrl { .. })
        ));
    }

    #[test]
    fn invalid_header() {
        let fs = HttpFs::new("https://example.com/").unwrap();
        assert!(matches!(
            fs.with_header("bad header", "x"),
            Err(Error::InvalidHeaderName(_))
        ));
    }

    #[test]
    fn transport_errors_wrap_into_fs_errors() {
        let err: FsError = Error::Status {
            status: 500,
            url: "https://example.com/x".to_string(),
        }
        .into();
        assert!(matches!(err, FsError::Transport(_)));
        assert!(err.to_string().contains("500"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn directories_are_implicit() {
        let fs = HttpFs::new("https://example.com/").unwrap();
        fs.mkdir(&fspath!("anything"), true).unwrap();
        assert!(fs.info(&FsPath::root()).unwrap().is_dir());
        assert!(matches!(
            fs.ls(&FsPath::root()),
            Err(FsError::Unsupported { operation: "ls" })
        ));
    }
}
