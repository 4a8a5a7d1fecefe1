use std::collections::HashMap;
use std::str;

use bytes::Bytes;

/// A parsed `multipart/form-data` body.
#[derive(Clone, Debug, Default)]
pub struct MultipartForm {
    /// Plain form fields.
    pub values: HashMap<String, Vec<String>>,
    /// Uploaded files, by field name.
    pub files: HashMap<String, Vec<FormFile>>,
}

/// A file uploaded through a multipart form.
#[derive(Clone, Debug)]
pub struct FormFile {
    /// The form field the file was sent under.
    pub field: String,
    /// The file name given by the client.
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FormFile {
    /// The size of the file in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Error returned when a multipart body cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum MultipartError {
    #[error("request content type is not multipart/form-data")]
    NotMultipart,
    #[error("multipart content type has no boundary")]
    MissingBoundary,
    #[error("malformed multipart body: {0}")]
    Malformed(&'static str),
}

impl MultipartForm {
    /// Parse a multipart body, given the request's `Content-Type`.
    pub fn parse(content_type: &str, body: &Bytes) -> Result<Self, MultipartError> {
        let ty: mime::Mime = content_type
            .parse()
            .map_err(|_| MultipartError::NotMultipart)?;

        if ty.type_() != mime::MULTIPART || ty.subtype() != mime::FORM_DATA {
            return Err(MultipartError::NotMultipart);
        }

        let boundary = ty
            .get_param(mime::BOUNDARY)
            .ok_or(MultipartError::MissingBoundary)?;

        let delimiter = format!("--{}", boundary.as_str());
        let separator = format!("\r\n{}", delimiter);

        let mut form = MultipartForm::default();

        let mut pos = find(body, delimiter.as_bytes(), 0)
            .ok_or(MultipartError::Malformed("missing opening boundary"))?
            + delimiter.len();

        loop {
            if body[pos..].starts_with(b"--") {
                break;
            }

            if !body[pos..].starts_with(b"\r\n") {
                return Err(MultipartError::Malformed("expected line break after boundary"));
            }
            pos += 2;

            let headers_end = find(body, b"\r\n\r\n", pos)
                .ok_or(MultipartError::Malformed("unterminated part headers"))?;
            let headers = str::from_utf8(&body[pos..headers_end])
                .map_err(|_| MultipartError::Malformed("part headers are not utf-8"))?;

            let data_start = headers_end + 4;
            let data_end = find(body, separator.as_bytes(), data_start)
                .ok_or(MultipartError::Malformed("missing closing boundary"))?;

            let part = Part::parse(headers)?;
            let data = body.slice(data_start..data_end);

            match part.filename {
                Some(filename) => form.files.entry(part.name.clone()).or_default().push(FormFile {
                    field: part.name,
                    filename,
                    content_type: part.content_type,
                    data,
                }),
                None => {
                    let value = String::from_utf8_lossy(&data).into_owned();
                    form.values.entry(part.name).or_default().push(value);
                }
            }

            pos = data_end + separator.len();
        }

        Ok(form)
    }

    /// The first value of a plain form field.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name)?.first().map(String::as_str)
    }

    /// The first file uploaded under a field.
    pub fn file(&self, name: &str) -> Option<&FormFile> {
        self.files.get(name)?.first()
    }
}

struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
}

impl Part {
    fn parse(headers: &str) -> Result<Part, MultipartError> {
        let mut name = None;
        let mut filename = None;
        let mut content_type = None;

        for line in headers.split("\r\n") {
            let (key, value) = match line.split_once(':') {
                Some(header) => header,
                None => continue,
            };

            if key.trim().eq_ignore_ascii_case("content-disposition") {
                for param in value.split(';').skip(1) {
                    if let Some((key, value)) = param.split_once('=') {
                        let value = value.trim().trim_matches('"').to_owned();
                        match key.trim() {
                            "name" => name = Some(value),
                            "filename" => filename = Some(value),
                            _ => {}
                        }
                    }
                }
            } else if key.trim().eq_ignore_ascii_case("content-type") {
                content_type = Some(value.trim().to_owned());
            }
        }

        Ok(Part {
            name: name.ok_or(MultipartError::Malformed("part without a name"))?,
            filename,
            content_type,
        })
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_and_files() {
        let body = Bytes::from_static(
            b"--XYZ\r\n\
              Content-Disposition: form-data; name=\"title\"\r\n\r\n\
              hello\r\n\
              --XYZ\r\n\
              Content-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
              Content-Type: text/plain\r\n\r\n\
              file body\r\n\
              --XYZ--\r\n",
        );

        let form = MultipartForm::parse("multipart/form-data; boundary=XYZ", &body).unwrap();
        assert_eq!(form.value("title"), Some("hello"));

        let file = form.file("doc").unwrap();
        assert_eq!(file.filename, "a.txt");
        assert_eq!(file.content_type.as_deref(), Some("text/plain"));
        assert_eq!(&file.data[..], b"file body");
    }
}
