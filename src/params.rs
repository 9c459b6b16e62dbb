//! Typed call parameters.
//!
//! Parameter payloads are opaque byte buffers tagged by a wire type.
//! The caller owns the containers; output buffers are replaced in place
//! when the server returns data.

/// Direction of a program-call parameter.
/// Values match the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ParameterType {
    /// Omitted parameter.
    Null = 255,
    /// Input only; the buffer travels to the server.
    Input = 11,
    /// Output only; the server fills the buffer.
    Output = 12,
    /// Both directions.
    InputOutput = 13,
}

impl ParameterType {
    /// Decode a wire value. Unrecognized values coerce to InputOutput.
    pub fn from_u16(value: u16) -> Self {
        match value {
            255 => Self::Null,
            11 => Self::Input,
            12 => Self::Output,
            13 => Self::InputOutput,
            _ => Self::InputOutput,
        }
    }
}

/// One program-call parameter: direction, payload, declared size.
#[derive(Debug, Clone)]
pub struct ProgramCallParameter {
    ptype: ParameterType,
    data: Vec<u8>,
    max_length: u32,
}

impl ProgramCallParameter {
    /// Create a parameter with an explicit type, payload and declared
    /// maximum length.
    pub fn new(ptype: ParameterType, data: Vec<u8>, max_length: u32) -> Self {
        Self {
            ptype,
            data,
            max_length,
        }
    }

    /// Input parameter sized by its payload.
    pub fn input(data: Vec<u8>) -> Self {
        Self::new(ParameterType::Input, data, 0)
    }

    /// Output parameter with a receiver size; no payload travels out.
    pub fn output(max_length: u32) -> Self {
        Self::new(ParameterType::Output, Vec::new(), max_length)
    }

    /// Input/output parameter.
    pub fn input_output(data: Vec<u8>, max_length: u32) -> Self {
        Self::new(ParameterType::InputOutput, data, max_length)
    }

    /// Omitted parameter.
    pub fn null() -> Self {
        Self::new(ParameterType::Null, Vec::new(), 0)
    }

    pub fn parameter_type(&self) -> ParameterType {
        self.ptype
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the payload with server-returned output data.
    pub(crate) fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    /// The receiver size the server is told about.
    ///
    /// Output parameters advertise the declared size alone; both input
    /// directions advertise at least the payload length.
    pub fn effective_max_length(&self) -> u32 {
        let payload_len = self.data.len() as u32;
        match self.ptype {
            ParameterType::Null => 0,
            ParameterType::Output => self.max_length,
            ParameterType::Input | ParameterType::InputOutput => self.max_length.max(payload_len),
        }
    }
}

/// Ordered program-call parameter list, fixed length at creation.
#[derive(Debug, Clone, Default)]
pub struct ProgramCallParameters {
    params: Vec<ProgramCallParameter>,
}

impl ProgramCallParameters {
    pub fn new(params: Vec<ProgramCallParameter>) -> Self {
        Self { params }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ProgramCallParameter> {
        self.params.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut ProgramCallParameter> {
        self.params.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProgramCallParameter> {
        self.params.iter()
    }
}

impl<'a> IntoIterator for &'a ProgramCallParameters {
    type Item = &'a ProgramCallParameter;
    type IntoIter = std::slice::Iter<'a, ProgramCallParameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

/// How a service-program argument is passed to the target function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ServiceProgramPassBy {
    Value = 1,
    Reference = 2,
}

impl ServiceProgramPassBy {
    /// Decode a wire value. Unrecognized values coerce to Reference.
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::Value,
            _ => Self::Reference,
        }
    }
}

/// Return-value convention of the called service-program function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ReturnFormat {
    /// void function.
    #[default]
    None = 0,
    /// 4-byte integer return value.
    Integer = 1,
    /// 16-byte pointer return value.
    Pointer = 2,
    /// 4-byte integer plus errno.
    IntegerErrno = 3,
}

impl ReturnFormat {
    /// Size of the receiver the trampoline allocates for this format.
    pub(crate) fn receiver_len(self) -> u32 {
        match self {
            Self::None | Self::Integer => 4,
            Self::Pointer => 16,
            Self::IntegerErrno => 8,
        }
    }
}

/// One service-program argument.
#[derive(Debug, Clone)]
pub struct ServiceProgramCallParameter {
    pass_by: ServiceProgramPassBy,
    data: Vec<u8>,
    max_length: u32,
}

impl ServiceProgramCallParameter {
    pub fn new(pass_by: ServiceProgramPassBy, data: Vec<u8>, max_length: u32) -> Self {
        Self {
            pass_by,
            data,
            max_length,
        }
    }

    /// Argument passed by value.
    pub fn by_value(data: Vec<u8>) -> Self {
        Self::new(ServiceProgramPassBy::Value, data, 0)
    }

    /// Argument passed by reference.
    pub fn by_reference(data: Vec<u8>, max_length: u32) -> Self {
        Self::new(ServiceProgramPassBy::Reference, data, max_length)
    }

    pub fn pass_by(&self) -> ServiceProgramPassBy {
        self.pass_by
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    pub fn effective_max_length(&self) -> u32 {
        self.max_length.max(self.data.len() as u32)
    }
}

/// Argument list and result state for a service-program call.
///
/// At most 7 arguments travel through the trampoline. After the call
/// the result fields hold the decoded return value per the selected
/// format.
#[derive(Debug, Clone, Default)]
pub struct ServiceProgramCallParameters {
    params: Vec<ServiceProgramCallParameter>,
    /// How the function's return value is materialized.
    pub return_format: ReturnFormat,
    /// Request 16-byte alignment of the receiver variable.
    pub align_receiver_16: bool,
    /// Returned integer value (Integer and IntegerErrno formats).
    pub integer_value: u32,
    /// Returned errno (IntegerErrno format).
    pub errno: u32,
    /// Returned pointer (Pointer format).
    pub pointer: [u8; 16],
}

impl ServiceProgramCallParameters {
    pub fn new(params: Vec<ServiceProgramCallParameter>, return_format: ReturnFormat) -> Self {
        Self {
            params,
            return_format,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ServiceProgramCallParameter> {
        self.params.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut ServiceProgramCallParameter> {
        self.params.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceProgramCallParameter> {
        self.params.iter()
    }
}
