use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct IOAttr {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@class")]
    pub class: String,
    #[serde(rename = "$value", default)]
    pub value: String,
}

impl IOAttr {
    pub fn new(name: &str, class: &str, value: String) -> Self {
        IOAttr {
            name: String::from(name),
            class: String::from(class),
            value,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
pub struct IOAttrs {
    #[serde(rename = "attribute", default)]
    pub attributes: Vec<IOAttr>,
}

impl IOAttrs {
    pub fn find(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq(name))
            .map(|attr| attr.value.as_str())
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut IOAttr> {
        self.attributes.iter_mut().find(|attr| attr.name.eq(name))
    }
}
