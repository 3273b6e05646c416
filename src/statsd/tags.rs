/// Which daemon convention governs tag placement in a line.
///
/// InfluxDB tags are spliced right after the bucket name (`bucket,k=v:1|c`),
/// Datadog tags right before the newline (`bucket:1|c|#k:v`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagFormat {
    /// Tags are dropped.
    #[default]
    None,
    /// `,tag1=payroll,region=us-west`
    InfluxDB,
    /// `|#tag1:value1,tag2:value2`
    Datadog,
}

/// A key/value tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Tag name.
    pub key: String,
    /// Tag value.
    pub value: String,
}

impl Tag {
    /// Creates a tag from any string-like key and value.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl TagFormat {
    /// Joins tags into the string spliced into every line.
    ///
    /// Returns an empty string for `TagFormat::None` or when there are no tags.
    #[must_use]
    pub fn join(self, tags: &[Tag]) -> String {
        if tags.is_empty() {
            return String::new();
        }

        match self {
            Self::None => String::new(),
            Self::InfluxDB => {
                let mut buffer = String::with_capacity(joined_len(tags));
                for tag in tags {
                    buffer.push(',');
                    buffer.push_str(&tag.key);
                    buffer.push('=');
                    buffer.push_str(&tag.value);
                }
                buffer
            }
            Self::Datadog => {
                let mut buffer = String::with_capacity(joined_len(tags) + 2);
                buffer.push_str("|#");
                let mut iter = tags.iter();
                if let Some(tag) = iter.next() {
                    push_pair(&mut buffer, tag, ':');
                }
                for tag in iter {
                    buffer.push(',');
                    push_pair(&mut buffer, tag, ':');
                }
                buffer
            }
        }
    }

    /// Inverse of [`TagFormat::join`].
    ///
    /// Pairs without a separator are kept with an empty value.
    #[must_use]
    pub fn split(self, joined: &str) -> Vec<Tag> {
        let (body, separator) = match self {
            Self::None => return Vec::new(),
            Self::InfluxDB => (joined.strip_prefix(',').unwrap_or(joined), '='),
            Self::Datadog => (joined.strip_prefix("|#").unwrap_or(joined), ':'),
        };
        if body.is_empty() {
            return Vec::new();
        }

        body.split(',')
            .map(|pair| match pair.split_once(separator) {
                Some((key, value)) => Tag::new(key, value),
                None => Tag::new(pair, ""),
            })
            .collect()
    }
}

/// Applies `updates` on top of `tags`: a tag whose key already exists replaces it,
/// anything else is appended in order.
pub fn merge_tags(tags: &mut Vec<Tag>, updates: impl IntoIterator<Item = Tag>) {
    for update in updates {
        if let Some(existing) = tags.iter_mut().find(|tag| tag.key == update.key) {
            *existing = update;
        } else {
            tags.push(update);
        }
    }
}

fn push_pair(buffer: &mut String, tag: &Tag, separator: char) {
    buffer.push_str(&tag.key);
    buffer.push(separator);
    buffer.push_str(&tag.value);
}

fn joined_len(tags: &[Tag]) -> usize {
    // key + value + separator + comma
    tags.iter().map(|tag| tag.key.len() + tag.value.len() + 2).sum()
}
