use super::*;
use crate::error::SerializeError;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::{Cursor, Write};

type XmlWriter = Cursor<Vec<u8>>;
type Result<T> = std::result::Result<T, SerializeError>;

/// Writes a graph element as XML.
pub trait ToXml<W: Write> {
    fn write_xml(&self, writer: &mut Writer<W>) -> Result<()>;
}

fn xml_error(err: std::io::Error) -> SerializeError {
    SerializeError::Xml(err.to_string())
}

fn write_tag_start(writer: &mut Writer<XmlWriter>, tag_name: &str) -> Result<()> {
    write_tag_start_with_attrs(writer, tag_name, &[])
}

fn write_tag_start_with_attrs(
    writer: &mut Writer<XmlWriter>,
    tag_name: &str,
    attrs: &[(&str, &str)],
) -> Result<()> {
    let mut elem = BytesStart::new(tag_name);
    for attr in attrs.iter() {
        elem.push_attribute(*attr);
    }
    writer.write_event(Event::Start(elem)).map_err(xml_error)
}

fn write_empty_with_attrs(
    writer: &mut Writer<XmlWriter>,
    tag_name: &str,
    attrs: &[(&str, &str)],
) -> Result<()> {
    let mut elem = BytesStart::new(tag_name);
    for attr in attrs.iter() {
        elem.push_attribute(*attr);
    }
    writer.write_event(Event::Empty(elem)).map_err(xml_error)
}

fn write_tag_end(writer: &mut Writer<XmlWriter>, tag_name: &str) -> Result<()> {
    writer
        .write_event(Event::End(BytesEnd::new(tag_name)))
        .map_err(xml_error)
}

fn write_tag(writer: &mut Writer<XmlWriter>, tag_name: &str, content: &str) -> Result<()> {
    write_tag_start(writer, tag_name)?;
    writer
        .write_event(Event::Text(BytesText::new(content)))
        .map_err(xml_error)?;
    write_tag_end(writer, tag_name)
}

fn write_for<T, F>(writer: &mut Writer<XmlWriter>, fl: &ForLoop<T>, mut body: F) -> Result<()>
where
    F: FnMut(&mut Writer<XmlWriter>, &T) -> Result<()>,
{
    write_tag_start_with_attrs(writer, "For", &[("var", fl.var.as_str()), ("in", fl.range.as_str())])?;
    for item in &fl.body {
        body(writer, item)?;
    }
    write_tag_end(writer, "For")
}

fn write_fanout<T, F>(writer: &mut Writer<XmlWriter>, fanout: &Fanout<T>, item: &F) -> Result<()>
where
    F: Fn(&mut Writer<XmlWriter>, &T) -> Result<()>,
{
    match fanout {
        Fanout::Item(value) => item(writer, value),
        Fanout::For(fl) => write_for(writer, fl, |w, inner| write_fanout(w, inner, item)),
    }
}

fn write_argument(writer: &mut Writer<XmlWriter>, tag: &str, arg: &Argument) -> Result<()> {
    write_tag_start(writer, tag)?;
    write_tag(writer, "ArgumentName", &arg.argument)?;
    write_tag(writer, "SharedDataName", &arg.channel)?;
    write_tag_end(writer, tag)
}

impl ToXml<XmlWriter> for Performer {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        write_tag_start(writer, "Performer")?;
        match &self.fanout {
            Some((var, range)) => {
                write_tag(writer, "PerformerID", &self.id.to_string())?;
                write_tag_start_with_attrs(writer, "For", &[("var", var.as_str()), ("in", range.as_str())])?;
                write_tag(writer, "Name", &self.name)?;
                write_tag(writer, "Code", &self.code)?;
                write_tag_end(writer, "For")?;
            }
            None => {
                write_tag(writer, "Name", &self.name)?;
                write_tag(writer, "Code", &self.code)?;
                write_tag(writer, "PerformerID", &self.id.to_string())?;
            }
        }
        write_tag_end(writer, "Performer")
    }
}

impl ToXml<XmlWriter> for Channel {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        write_tag_start(writer, "SharedData")?;
        write_tag(writer, "Name", &self.name)?;
        write_tag(writer, "Type", "Scalar")?;
        write_tag(writer, "Layout", self.layout.as_str())?;
        write_tag(writer, "Size", &self.layout.size())?;
        write_tag(writer, "OwnerName", &self.owner)?;
        for user in &self.users {
            write_fanout(writer, user, &|w, name: &String| write_tag(w, "UserName", name))?;
        }
        write_tag_end(writer, "SharedData")
    }
}

impl ToXml<XmlWriter> for Operation {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        write_tag_start(writer, "Operation")?;
        write_tag(writer, "Name", &self.name)?;
        write_tag(writer, "PerformerName", &self.performer)?;
        for p in &self.parameters {
            write_tag_start(writer, "Parameter")?;
            write_tag(writer, "ArgumentName", &p.argument)?;
            write_tag(writer, "ArgumentValue", &p.value)?;
            write_tag_end(writer, "Parameter")?;
        }
        for input in &self.inputs {
            write_fanout(writer, input, &|w, a: &Argument| write_argument(w, "Input", a))?;
        }
        for output in &self.outputs {
            write_fanout(writer, output, &|w, a: &Argument| write_argument(w, "Output", a))?;
        }
        write_tag_end(writer, "Operation")
    }
}

impl ToXml<XmlWriter> for OperationNode {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        match self {
            OperationNode::Single(op) => op.write_xml(writer),
            OperationNode::Batch(nodes) => {
                write_tag_start(writer, "Operation")?;
                for node in nodes {
                    node.write_xml(writer)?;
                }
                write_tag_end(writer, "Operation")
            }
            OperationNode::For(fl) => write_for(writer, fl, |w, node| node.write_xml(w)),
        }
    }
}

impl ToXml<XmlWriter> for Stage {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        write_tag_start(writer, "Stage")?;
        write_tag(writer, "Name", &self.name)?;
        for input in &self.inputs {
            write_tag_start(writer, "Input")?;
            write_tag(writer, "SharedDataName", input)?;
            write_tag_end(writer, "Input")?;
        }
        for node in &self.operations {
            node.write_xml(writer)?;
        }
        for output in &self.outputs {
            write_tag_start(writer, "Output")?;
            write_tag(writer, "SharedDataName", output)?;
            write_tag_end(writer, "Output")?;
        }
        write_tag_end(writer, "Stage")
    }
}

impl ToXml<XmlWriter> for OptionNode {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        match self {
            OptionNode::Value { key, value } => write_tag(writer, key, value),
            OptionNode::Block { key, children } => {
                write_tag_start(writer, key)?;
                for child in children {
                    child.write_xml(writer)?;
                }
                write_tag_end(writer, key)
            }
        }
    }
}

impl InterfaceGraph {
    /// Serializes the graph as the interface XML document.
    ///
    /// Output is deterministic: the same graph always yields the same bytes.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
            .map_err(xml_error)?;
        if self.include_defines {
            write_empty_with_attrs(&mut writer, "include", &[("filename", "defines.xml")])?;
        }

        write_tag_start(&mut writer, "Console")?;
        write_tag(&mut writer, "Verbose", if self.verbose { "true" } else { "false" })?;
        write_tag_end(&mut writer, "Console")?;

        for performer in &self.performers {
            performer.write_xml(&mut writer)?;
        }
        for channel in &self.channels {
            write_fanout(&mut writer, channel, &|w, c: &Channel| c.write_xml(w))?;
        }
        for stage in &self.stages {
            stage.write_xml(&mut writer)?;
        }
        self.optimizer.write_xml(&mut writer)?;

        let mut bytes = writer.into_inner().into_inner();
        bytes.write_all(b"\n").map_err(xml_error)?;
        String::from_utf8(bytes).map_err(|e| SerializeError::Utf8(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_channel_xml() {
        let channel = Channel {
            name: "Design Volume".to_string(),
            layout: Layout::Global(1),
            owner: "platomain".to_string(),
            users: vec![Fanout::Item("platomain".to_string())],
        };
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        channel.write_xml(&mut writer).unwrap();
        let xml = String::from_utf8(writer.into_inner().into_inner()).unwrap();
        assert_eq!(
            xml,
            "<SharedData><Name>Design Volume</Name><Type>Scalar</Type><Layout>Global</Layout>\
             <Size>1</Size><OwnerName>platomain</OwnerName><UserName>platomain</UserName></SharedData>"
        );
    }

    #[test]
    fn test_fanout_users_are_wrapped_in_for() {
        let channel = Channel {
            name: "Topology".to_string(),
            layout: Layout::NodalField,
            owner: "platomain".to_string(),
            users: vec![
                Fanout::Item("platomain".to_string()),
                Fanout::for_each_in(
                    "PerformerIndex",
                    "Performers",
                    vec![Fanout::Item("plato_analyze_{PerformerIndex}".to_string())],
                ),
            ],
        };
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        channel.write_xml(&mut writer).unwrap();
        let xml = String::from_utf8(writer.into_inner().into_inner()).unwrap();
        assert!(xml.contains("<Size>IGNORE</Size>"));
        assert!(xml.contains(
            "<For var=\"PerformerIndex\" in=\"Performers\"><UserName>plato_analyze_{PerformerIndex}</UserName></For>"
        ));
    }

    #[test]
    fn test_batch_operation_nests() {
        let node = OperationNode::Batch(vec![
            Operation::new("Compute Objective Value", "plato_analyze_1").into(),
            Operation::new("Compute Objective Value", "plato_analyze_2").into(),
        ]);
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        node.write_xml(&mut writer).unwrap();
        let xml = String::from_utf8(writer.into_inner().into_inner()).unwrap();
        assert!(xml.starts_with("<Operation><Operation><Name>Compute Objective Value</Name>"));
        assert!(xml.ends_with("</Operation></Operation>"));
    }
}
