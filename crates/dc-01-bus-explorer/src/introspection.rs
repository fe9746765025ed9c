//! # Introspection Translator
//!
//! Turns a bus introspection document into [`ParsedIntrospection`] records.
//! Pure: no I/O, no state.
//!
//! ## Rules
//!
//! - Method args with `direction="in"` go to `in_args`; everything else,
//!   including a missing direction, goes to `out_args`.
//! - Signal args are always reported with direction `out`.
//! - Child `<node name="x"/>` elements become `NodeInfo { name: "x", path: "/x" }`.

use quick_xml::de::from_str;
use serde::Deserialize;
use shared_types::{
    Annotations, ArgumentInfo, InterfaceInfo, MethodInfo, NodeInfo, ParsedIntrospection,
    PropertyInfo, SignalInfo,
};

use crate::error::ExplorerError;

const DIRECTION_IN: &str = "in";
const DIRECTION_OUT: &str = "out";

#[derive(Debug, Deserialize)]
struct XmlNode {
    #[serde(rename = "interface", default)]
    interfaces: Vec<XmlInterface>,
    #[serde(rename = "node", default)]
    children: Vec<XmlChild>,
}

#[derive(Debug, Deserialize)]
struct XmlInterface {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "method", default)]
    methods: Vec<XmlMember>,
    #[serde(rename = "property", default)]
    properties: Vec<XmlProperty>,
    #[serde(rename = "signal", default)]
    signals: Vec<XmlMember>,
}

/// `<method>` and `<signal>` share a shape.
#[derive(Debug, Deserialize)]
struct XmlMember {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "arg", default)]
    args: Vec<XmlArg>,
    #[serde(rename = "annotation", default)]
    annotations: Vec<XmlAnnotation>,
}

#[derive(Debug, Deserialize)]
struct XmlArg {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@type")]
    arg_type: String,
    #[serde(rename = "@direction", default)]
    direction: String,
}

#[derive(Debug, Deserialize)]
struct XmlProperty {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@type")]
    prop_type: String,
    #[serde(rename = "@access")]
    access: String,
    #[serde(rename = "annotation", default)]
    annotations: Vec<XmlAnnotation>,
}

#[derive(Debug, Deserialize)]
struct XmlAnnotation {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@value", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct XmlChild {
    #[serde(rename = "@name")]
    name: String,
}

/// Parse an introspection document.
pub fn parse_introspection(xml: &str) -> Result<ParsedIntrospection, ExplorerError> {
    let node: XmlNode = from_str(xml).map_err(|e| ExplorerError::Introspection(e.to_string()))?;

    Ok(ParsedIntrospection {
        interfaces: node.interfaces.into_iter().map(convert_interface).collect(),
        nodes: node
            .children
            .into_iter()
            .map(|child| NodeInfo {
                path: format!("/{}", child.name),
                name: child.name,
            })
            .collect(),
    })
}

fn convert_interface(iface: XmlInterface) -> InterfaceInfo {
    InterfaceInfo {
        name: iface.name,
        methods: iface.methods.into_iter().map(convert_method).collect(),
        properties: iface.properties.into_iter().map(convert_property).collect(),
        signals: iface.signals.into_iter().map(convert_signal).collect(),
    }
}

fn convert_method(method: XmlMember) -> MethodInfo {
    let (in_args, out_args): (Vec<_>, Vec<_>) = method
        .args
        .into_iter()
        .map(|arg| ArgumentInfo {
            name: arg.name,
            arg_type: arg.arg_type,
            direction: arg.direction,
        })
        .partition(|arg| arg.direction == DIRECTION_IN);

    MethodInfo {
        name: method.name,
        in_args,
        out_args,
        annotations: annotations(method.annotations),
    }
}

fn convert_property(prop: XmlProperty) -> PropertyInfo {
    PropertyInfo {
        name: prop.name,
        prop_type: prop.prop_type,
        access: prop.access,
        value: None,
        annotations: annotations(prop.annotations),
    }
}

fn convert_signal(signal: XmlMember) -> SignalInfo {
    SignalInfo {
        name: signal.name,
        args: signal
            .args
            .into_iter()
            .map(|arg| ArgumentInfo {
                name: arg.name,
                arg_type: arg.arg_type,
                direction: DIRECTION_OUT.to_string(),
            })
            .collect(),
        annotations: annotations(signal.annotations),
    }
}

fn annotations(list: Vec<XmlAnnotation>) -> Annotations {
    list.into_iter().map(|a| (a.name, a.value)).collect()
}
