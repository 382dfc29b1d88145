use std::collections::HashMap;

/// Elements that display live averages, addressed by id.
pub trait AverageBoard: Send {
    /// Sets the text of `element_id`; false if there is no such element.
    fn update(&mut self, element_id: &str, text: &str) -> bool;
}

/// Id of the element showing the average for `column`.
pub fn element_id(column: &str) -> String {
    let slug: String = column
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    format!("avg-{}", slug)
}

pub fn format_average(average: Option<f64>) -> String {
    match average {
        Some(value) if value.is_finite() => format!("{:.2}", value),
        _ => "n/a".to_owned(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBoard {
    elements: HashMap<String, Option<String>>,
}

impl MemoryBoard {
    /// A board with one element per column.
    pub fn with_columns<'a>(columns: impl IntoIterator<Item = &'a str>) -> Self {
        MemoryBoard {
            elements: columns
                .into_iter()
                .map(|column| (element_id(column), None))
                .collect(),
        }
    }

    pub fn text(&self, element_id: &str) -> Option<&str> {
        self.elements.get(element_id)?.as_deref()
    }
}

impl AverageBoard for MemoryBoard {
    fn update(&mut self, element_id: &str, text: &str) -> bool {
        match self.elements.get_mut(element_id) {
            Some(slot) => {
                *slot = Some(text.to_owned());
                true
            }
            None => false,
        }
    }
}
