//! Messages used across the publisher tests.

use std::borrow::Cow;

use exchange_publisher::{Message, MessageKind};
use serde::{Serialize, Serializer};

/// Stock change local to the products service.
#[derive(Debug, Clone, Serialize)]
pub struct StockUpdated {
    pub product_id: u32,
    pub stock: u32,
}

impl Message for StockUpdated {
    const KIND: MessageKind = MessageKind::Domain;
}

/// Product creation announced to other services, described the way a
/// consumer on another stack expects to see its type.
#[derive(Debug, Clone, Serialize)]
pub struct ProductCreated {
    pub id: u32,
    pub name: String,
    #[serde(skip)]
    pub build_version: &'static str,
}

impl ProductCreated {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            build_version: "1.0.0.0",
        }
    }
}

impl Message for ProductCreated {
    const KIND: MessageKind = MessageKind::Integration;

    fn type_descriptor(&self) -> Cow<'_, str> {
        let version = self.build_version;
        Cow::Owned(format!(
            "Distribt.Shared.Communication.Messages.IntegrationMessage`1[[Distribt.Services.Products.Dtos.ProductCreated, Distribt.Services.Products.Dtos, Version={version}, Culture=neutral, PublicKeyToken=null]], Distribt.Shared.Communication, Version={version}, Culture=neutral, PublicKeyToken=null"
        ))
    }
}

pub const PRODUCT_CREATED_TYPE: &str = "Distribt.Shared.Communication.Messages.IntegrationMessage`1[[Distribt.Services.Products.Dtos.ProductCreated, Distribt.Services.Products.Dtos]], Distribt.Shared.Communication";

/// Domain message whose payload can be made to fail serialization.
#[derive(Debug, Clone)]
pub struct PriceChanged {
    pub product_id: u32,
    pub price: i64,
    pub corrupt: bool,
}

impl PriceChanged {
    pub fn valid(product_id: u32, price: i64) -> Self {
        Self {
            product_id,
            price,
            corrupt: false,
        }
    }

    pub fn corrupt(product_id: u32) -> Self {
        Self {
            product_id,
            price: 0,
            corrupt: true,
        }
    }
}

impl Serialize for PriceChanged {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.corrupt {
            return Err(serde::ser::Error::custom("price is corrupt"));
        }
        (self.product_id, self.price).serialize(serializer)
    }
}

impl Message for PriceChanged {
    const KIND: MessageKind = MessageKind::Domain;
}
