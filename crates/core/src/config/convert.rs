use crate::providers::TypeKey;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Failure to convert a configuration string into a typed value
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot convert '{value}' to {type_name}: {message}")]
pub struct ConversionError {
    pub type_name: String,
    pub value: String,
    pub message: String,
}

impl ConversionError {
    pub fn new(
        type_name: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}

type Converter = Box<dyn Fn(&str) -> Result<Box<dyn Any + Send>, ConversionError> + Send + Sync>;

/// Table of string parsers keyed by target type
pub struct ValueConverters {
    converters: HashMap<TypeId, Converter>,
}

impl ValueConverters {
    /// Create a table with the built-in converters
    pub fn new() -> Self {
        let mut converters = Self::empty();
        converters
            .register::<bool, _>(parse_bool)
            .register::<String, _>(|raw| Ok(raw.to_string()))
            .register::<char, _>(parse_char)
            .register::<PathBuf, _>(|raw| Ok(PathBuf::from(raw)));
        converters
            .register_trimmed::<i8>()
            .register_trimmed::<i16>()
            .register_trimmed::<i32>()
            .register_trimmed::<i64>()
            .register_trimmed::<i128>()
            .register_trimmed::<isize>()
            .register_trimmed::<u8>()
            .register_trimmed::<u16>()
            .register_trimmed::<u32>()
            .register_trimmed::<u64>()
            .register_trimmed::<u128>()
            .register_trimmed::<usize>()
            .register_trimmed::<f32>()
            .register_trimmed::<f64>();
        converters
    }

    /// Create a table without any converter
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// Register a parser for `T`, replacing any existing one
    pub fn register<T, F>(&mut self, parse: F) -> &mut Self
    where
        T: Send + 'static,
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        let converter: Converter = Box::new(move |raw: &str| {
            parse(raw)
                .map(|value| Box::new(value) as Box<dyn Any + Send>)
                .map_err(|message| ConversionError::new(std::any::type_name::<T>(), raw, message))
        });
        self.converters.insert(TypeId::of::<T>(), converter);
        self
    }

    /// Register `T` through its `FromStr` implementation
    pub fn register_from_str<T>(&mut self) -> &mut Self
    where
        T: FromStr + Send + 'static,
        T::Err: Display,
    {
        self.register::<T, _>(|raw| raw.parse::<T>().map_err(|e| e.to_string()))
    }

    fn register_trimmed<T>(&mut self) -> &mut Self
    where
        T: FromStr + Send + 'static,
        T::Err: Display,
    {
        self.register::<T, _>(|raw| raw.trim().parse::<T>().map_err(|e| e.to_string()))
    }

    /// Check if a converter exists for a type
    pub fn supports(&self, target: &TypeKey) -> bool {
        self.converters.contains_key(&target.type_id())
    }

    /// Convert a string into a boxed value of the target type
    pub fn convert(&self, target: &TypeKey, raw: &str) -> Result<Box<dyn Any + Send>, ConversionError> {
        let converter = self.converters.get(&target.type_id()).ok_or_else(|| {
            ConversionError::new(target.type_name(), raw, "no converter registered for this type")
        })?;
        converter(raw)
    }

    /// Convert a string into a typed value
    pub fn parse<T: 'static>(&self, raw: &str) -> Result<T, ConversionError> {
        let target = TypeKey::of::<T>();
        self.convert(&target, raw)?
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| ConversionError::new(target.type_name(), raw, "converter produced a different type"))
    }
}

impl Default for ValueConverters {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ValueConverters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueConverters")
            .field("converter_count", &self.converters.len())
            .finish()
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err("expected 'true' or 'false'".to_string())
    }
}

fn parse_char(raw: &str) -> Result<char, String> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err("expected exactly one character".to_string()),
    }
}
