//! GraphBinary type codes.
//!
//! Every fully-qualified value starts with a type code byte followed by a
//! value flag byte. A set null flag means no value bytes follow.

/// Custom type, followed by its type name and custom type info
pub const CUSTOM: u8 = 0x00;
/// 32-bit integer
pub const INT: u8 = 0x01;
/// 64-bit integer
pub const LONG: u8 = 0x02;
/// UTF-8 string, length prefixed
pub const STRING: u8 = 0x03;
/// Milliseconds since epoch
pub const DATE: u8 = 0x04;
/// Milliseconds since epoch
pub const TIMESTAMP: u8 = 0x05;
/// 64-bit float
pub const DOUBLE: u8 = 0x07;
/// 32-bit float
pub const FLOAT: u8 = 0x08;
/// Date and time without a zone: {year}{month}{day}{nano of day}
pub const LOCAL_DATE_TIME: u8 = 0x85;
/// Duration: {seconds}{nanos}
pub const DURATION: u8 = 0x81;
/// List
pub const LIST: u8 = 0x09;
/// Map
pub const MAP: u8 = 0x0A;
/// Set
pub const SET: u8 = 0x0B;
/// UUID, 16 bytes
pub const UUID: u8 = 0x0C;
/// Edge
pub const EDGE: u8 = 0x0D;
/// Edge or meta property
pub const PROPERTY: u8 = 0x0F;
/// Vertex
pub const VERTEX: u8 = 0x11;
/// Vertex property
pub const VERTEX_PROPERTY: u8 = 0x12;
/// Traversal bytecode
pub const BYTECODE: u8 = 0x15;
/// Traverser
pub const TRAVERSER: u8 = 0x21;
/// Arbitrary-precision decimal: {scale}{unscaled big integer}
pub const BIG_DECIMAL: u8 = 0x22;
/// Arbitrary-precision integer, length-prefixed two's complement
pub const BIG_INTEGER: u8 = 0x23;
/// Signed byte
pub const BYTE: u8 = 0x24;
/// Byte buffer, length prefixed
pub const BYTE_BUFFER: u8 = 0x25;
/// 16-bit integer
pub const SHORT: u8 = 0x26;
/// Boolean
pub const BOOLEAN: u8 = 0x27;
/// Null of unspecified type
pub const UNSPECIFIED_NULL: u8 = 0xFE;

/// Value flag: value present
pub const VALUE_FLAG_NONE: u8 = 0x00;
/// Value flag: null
pub const VALUE_FLAG_NULL: u8 = 0x01;

/// Type name for error messages.
pub fn type_name(code: u8) -> &'static str {
    match code {
        CUSTOM => "Custom",
        INT => "Int",
        LONG => "Long",
        STRING => "String",
        DATE => "Date",
        TIMESTAMP => "Timestamp",
        DOUBLE => "Double",
        FLOAT => "Float",
        LIST => "List",
        MAP => "Map",
        SET => "Set",
        UUID => "UUID",
        EDGE => "Edge",
        PROPERTY => "Property",
        VERTEX => "Vertex",
        VERTEX_PROPERTY => "VertexProperty",
        BYTECODE => "Bytecode",
        TRAVERSER => "Traverser",
        BIG_DECIMAL => "BigDecimal",
        BIG_INTEGER => "BigInteger",
        BYTE => "Byte",
        BYTE_BUFFER => "ByteBuffer",
        SHORT => "Short",
        DURATION => "Duration",
        LOCAL_DATE_TIME => "LocalDateTime",
        BOOLEAN => "Boolean",
        UNSPECIFIED_NULL => "UnspecifiedNull",
        _ => "Unknown",
    }
}
