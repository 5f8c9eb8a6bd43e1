//! The file address a caller is asking about, taken from the matched route.

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Trailing path segment that selects the upload operation.
pub const UPLOAD_SEGMENT: &str = "upload";

/// What the caller wants to do with the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Download,
}

impl Operation {
    /// Pick the operation from the optional trailing segment of the route.
    ///
    /// No segment means Download, `upload` means Upload. Anything else is
    /// rejected rather than falling back to Download.
    pub fn from_trailing_segment(segment: Option<&str>) -> Result<Self, RequestError> {
        match segment {
            None => Ok(Self::Download),
            Some(UPLOAD_SEGMENT) => Ok(Self::Upload),
            Some(other) => Err(RequestError::UnsupportedOperation(other.to_string())),
        }
    }

    /// HTTP method the presigned URL is bound to.
    pub fn http_method(&self) -> &'static str {
        match self {
            Self::Download => "GET",
            Self::Upload => "PUT",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => write!(f, "UL"),
            Self::Download => write!(f, "DL"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("unsupported operation `{0}`")]
    UnsupportedOperation(String),
}

/// Version segments look like `v1`, `v2`, ...
pub fn is_version_segment(segment: &str) -> bool {
    segment.strip_prefix('v').is_some_and(|rest| !rest.is_empty())
}

/// Raw route parameters as captured by the router.
///
/// `version` must look like `v{n}` but is otherwise not interpreted.
#[derive(Debug, Clone, Deserialize)]
pub struct PathParams {
    pub version: String,
    pub project_id: String,
    pub object_id: String,
    pub user_id: String,
    pub file_id: String,
    pub action: Option<String>,
}

/// Immutable view of one request's target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    pub project_id: String,
    pub object_id: String,
    pub user_id: String,
    pub file_id: String,
    pub operation: Operation,
}

impl RequestPath {
    pub fn from_params(params: PathParams) -> Result<Self, RequestError> {
        let operation = Operation::from_trailing_segment(params.action.as_deref())?;
        Ok(Self {
            project_id: params.project_id,
            object_id: params.object_id,
            user_id: params.user_id,
            file_id: params.file_id,
            operation,
        })
    }
}

/// Object key inside the bucket: `/{project}/{object}/{file}`.
pub fn resource_key(project_id: &str, object_id: &str, file_id: &str) -> String {
    format!("/{}/{}/{}", project_id, object_id, file_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(action: Option<&str>) -> PathParams {
        PathParams {
            version: "v1".into(),
            project_id: "p".into(),
            object_id: "o".into(),
            user_id: "42".into(),
            file_id: "5.csv".into(),
            action: action.map(str::to_string),
        }
    }

    #[test]
    fn bare_route_is_download() {
        let path = RequestPath::from_params(params(None)).unwrap();
        assert_eq!(path.operation, Operation::Download);
        assert_eq!(
            resource_key(&path.project_id, &path.object_id, &path.file_id),
            "/p/o/5.csv"
        );
    }

    #[test]
    fn upload_segment_selects_upload() {
        let path = RequestPath::from_params(params(Some("upload"))).unwrap();
        assert_eq!(path.operation, Operation::Upload);
        assert_eq!(path.operation.http_method(), "PUT");
    }

    #[test]
    fn unknown_segment_is_rejected() {
        let err = RequestPath::from_params(params(Some("delete"))).unwrap_err();
        assert_eq!(err, RequestError::UnsupportedOperation("delete".into()));
    }

    #[test]
    fn version_segment_needs_v_prefix() {
        assert!(is_version_segment("v1"));
        assert!(is_version_segment("v2beta"));
        assert!(!is_version_segment("v"));
        assert!(!is_version_segment("nope"));
        assert!(!is_version_segment("1"));
    }
}
