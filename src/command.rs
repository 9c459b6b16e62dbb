//! Call engine: CL commands, program calls and service-program calls.
//!
//! Everything here runs on the authenticated Remote Command channel.
//! Requests are assembled by pure builders so the wire layout is
//! testable without a server; the session methods wrap them with I/O
//! and fatal-error teardown.
//!
//! Result codes are data, not errors: a non-zero code comes back as the
//! `Ok` value together with whatever messages the server attached, and
//! the session stays usable.

use tracing::debug;

use crate::codec;
use crate::codec::ebcdic::{encode_name, CodePage};
use crate::error::{Error, Result};
use crate::messages::{parse_message_stream, CallMessages};
use crate::params::{
    ParameterType, ProgramCallParameter, ProgramCallParameters, ServiceProgramCallParameters,
};
use crate::protocol::constants::*;
use crate::protocol::{write_header, DataStream};
use crate::session::Session;

impl Session {
    /// Run a CL command.
    ///
    /// Returns the server's result code; 0 and 0x0400 are success
    /// (0x0400 is a warning-level completion). `messages` receives the
    /// reply's message list.
    pub async fn call_command(&mut self, command: &str, messages: &mut CallMessages) -> Result<u16> {
        match self.call_command_inner(command, messages).await {
            Ok(code) => Ok(code),
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Call a program in a library with a typed parameter list.
    ///
    /// Output and input/output parameter buffers are replaced in place
    /// with the server's data. The result code is returned, never
    /// raised; messages accompany non-zero codes.
    pub async fn call_program(
        &mut self,
        program: &str,
        library: &str,
        parameters: &mut ProgramCallParameters,
        messages: &mut CallMessages,
    ) -> Result<u16> {
        match self.call_program_inner(program, library, parameters, messages).await {
            Ok(code) => Ok(code),
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Call a service-program function through the QZRUCLSP API.
    ///
    /// At most 7 arguments. After the call the caller's buffers hold
    /// the returned argument data and `parameters` carries the decoded
    /// return value per its format selector.
    pub async fn call_service_program(
        &mut self,
        program: &str,
        library: &str,
        function: &str,
        parameters: &mut ServiceProgramCallParameters,
        messages: &mut CallMessages,
    ) -> Result<u16> {
        match self
            .call_service_program_inner(program, library, function, parameters, messages)
            .await
        {
            Ok(code) => Ok(code),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn call_command_inner(
        &mut self,
        command: &str,
        messages: &mut CallMessages,
    ) -> Result<u16> {
        if !self.state.is_ready() {
            return Err(Error::NotConnected);
        }
        let cp = CodePage::from_ccsid(self.attributes.ccsid)?;
        let request = build_command_request(command, self.attributes.datastream_level, cp);

        let frame = self.transact_command(request).await?;
        let code = codec::read_u16(&frame, OFFSET_RESULT);
        let count = codec::read_u16(&frame, OFFSET_RESULT + 2);
        debug!(code, count, command, "command completed");

        messages.clear();
        if count > 0 {
            parse_message_stream(&frame, count, cp, messages)?;
        }
        Ok(code)
    }

    async fn call_program_inner(
        &mut self,
        program: &str,
        library: &str,
        parameters: &mut ProgramCallParameters,
        messages: &mut CallMessages,
    ) -> Result<u16> {
        check_name("program", program)?;
        check_name("library", library)?;
        if !self.state.is_ready() {
            return Err(Error::NotConnected);
        }
        let cp = CodePage::from_ccsid(self.attributes.ccsid)?;
        let request =
            build_program_request(program, library, parameters, self.attributes.datastream_level, cp);

        let frame = self.transact_command(request).await?;
        let code = codec::read_u16(&frame, OFFSET_RESULT);
        let count = codec::read_u16(&frame, OFFSET_RESULT + 2);
        debug!(code, count, program, library, "program call completed");

        messages.clear();
        if code != 0 {
            if count > 0 {
                parse_message_stream(&frame, count, cp, messages)?;
            }
            return Ok(code);
        }

        apply_output_parameters(&frame, parameters);
        Ok(code)
    }

    async fn call_service_program_inner(
        &mut self,
        program: &str,
        library: &str,
        function: &str,
        parameters: &mut ServiceProgramCallParameters,
        messages: &mut CallMessages,
    ) -> Result<u16> {
        check_name("service program", program)?;
        check_name("library", library)?;
        if parameters.len() > MAX_SRVPGM_PARAMETERS {
            return Err(Error::config(format!(
                "service-program calls carry at most {MAX_SRVPGM_PARAMETERS} parameters"
            )));
        }
        if !self.state.is_ready() {
            return Err(Error::NotConnected);
        }
        let cp = CodePage::from_ccsid(self.attributes.ccsid)?;

        let mut trampoline = build_trampoline_parameters(program, library, function, parameters, cp);
        let code = self
            .call_program_inner(QZRUCLSP, QSYS, &mut trampoline, messages)
            .await?;

        for index in 0..parameters.len() {
            let data = trampoline
                .get(TRAMPOLINE_FIXED + index)
                .map(|p| p.data().to_vec())
                .unwrap_or_default();
            if let Some(param) = parameters.get_mut(index) {
                param.set_data(data);
            }
        }
        decode_return_value(parameters, &trampoline);
        Ok(code)
    }
}

/// Fixed QZRUCLSP parameters ahead of the caller's arguments.
const TRAMPOLINE_FIXED: usize = 7;

fn check_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(Error::config(format!(
            "{what} name must be 1-{MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Message-option byte for the negotiated datastream level.
fn message_option(datastream_level: u16) -> u8 {
    match datastream_level {
        0..=6 => 0,
        7..=9 => 2,
        _ => 4,
    }
}

/// Assemble a run-command request.
///
/// At datastream levels above 10 the command text travels as UTF-16BE
/// with a leading CCSID word; otherwise it is EBCDIC under the session
/// code page.
fn build_command_request(command: &str, datastream_level: u16, cp: &CodePage) -> Vec<u8> {
    let mut ds = DataStream::with_capacity(64 + command.len() * 2);
    write_header(&mut ds, SERVER_COMMAND, 1, REQREP_RC_RUN_COMMAND);
    ds.write_u8(message_option(datastream_level));

    if datastream_level > 10 {
        let text = codec::to_utf16be(command);
        ds.write_u32(10 + text.len() as u32);
        ds.write_u16(CP_COMMAND_UNICODE);
        ds.write_u32(CLIENT_CCSID);
        ds.write_bytes(&text);
    } else {
        let text = cp.encode(command);
        ds.write_u32(6 + text.len() as u32);
        ds.write_u16(CP_COMMAND_EBCDIC);
        ds.write_bytes(&text);
    }
    ds.into_vec()
}

/// Assemble a program-call request: 23-byte template (program, library,
/// message option, parameter count) followed by one 0x1103 block per
/// parameter.
fn build_program_request(
    program: &str,
    library: &str,
    parameters: &ProgramCallParameters,
    datastream_level: u16,
    cp: &CodePage,
) -> Vec<u8> {
    let mut ds = DataStream::with_capacity(64);
    write_header(&mut ds, SERVER_COMMAND, 23, REQREP_RC_CALL_PROGRAM);
    ds.write_bytes(&encode_name(program, 10, cp));
    ds.write_bytes(&encode_name(library, 10, cp));
    ds.write_u8(message_option(datastream_level));
    ds.write_u16(parameters.len() as u16);

    for param in parameters {
        let mut wire_type = param.parameter_type() as u16;
        let mut payload = param.data();
        if param.parameter_type() == ParameterType::Null {
            payload = &[];
            // Servers below datastream level 6 predate NULL parameters
            // and expect a bare type value of 1 instead.
            if datastream_level < 6 {
                wire_type = 1;
            }
        }
        ds.write_u32(12 + payload.len() as u32);
        ds.write_u16(CP_PROGRAM_PARAMETER);
        ds.write_u32(param.effective_max_length());
        ds.write_u16(wire_type);
        ds.write_bytes(payload);
    }
    ds.into_vec()
}

/// Walk the reply's parameter blocks and replace each output-capable
/// parameter's payload in place.
///
/// The scan stops early at either sentinel length (zero or four EBCDIC
/// spaces) and whenever a block would overrun the frame.
fn apply_output_parameters(frame: &[u8], parameters: &mut ProgramCallParameters) {
    let mut pos = OFFSET_FIELDS;
    for index in 0..parameters.len() {
        let wants_output = matches!(
            parameters.get(index).map(|p| p.parameter_type()),
            Some(ParameterType::Output | ParameterType::InputOutput)
        );
        if !wants_output {
            continue;
        }
        if pos + 12 > frame.len() {
            break;
        }
        let ll = codec::read_u32(frame, pos) as usize;
        if ll == 0 || ll as u32 == FRAME_IDLE_MARKER || ll < 12 || pos + ll > frame.len() {
            break;
        }
        let data = frame[pos + 12..pos + ll].to_vec();
        if let Some(param) = parameters.get_mut(index) {
            param.set_data(data);
        }
        pos += ll;
    }
}

/// Build the 7+N parameter list for the QZRUCLSP trampoline.
fn build_trampoline_parameters(
    program: &str,
    library: &str,
    function: &str,
    parameters: &ServiceProgramCallParameters,
    cp: &CodePage,
) -> ProgramCallParameters {
    let count = parameters.len();

    // 0: qualified service-program name, 20 bytes EBCDIC.
    let mut qualified = encode_name(program, 10, cp);
    qualified.extend_from_slice(&encode_name(library, 10, cp));

    // 1: function name, NUL-terminated EBCDIC.
    let mut function_name = cp.encode(function);
    function_name.push(0);

    // 2: return-value format selector.
    let return_format = (parameters.return_format as u32).to_be_bytes().to_vec();

    // 3: pass-by convention per argument; a single zero word when empty.
    let pass_by: Vec<u8> = if count == 0 {
        0u32.to_be_bytes().to_vec()
    } else {
        parameters
            .iter()
            .flat_map(|p| (p.pass_by() as u32).to_be_bytes())
            .collect()
    };

    // 4: argument count.
    let arg_count = (count as u32).to_be_bytes().to_vec();

    // 6: return-value receiver.
    let receiver_len = parameters.return_format.receiver_len();

    // 5: receiver aligner. When 16-byte alignment is requested the pad
    // compensates for everything QZRUCLSP places ahead of the receiver.
    let aligner = if parameters.align_receiver_16 && count > 0 {
        let header_bytes = function_name.len() + pass_by.len() + receiver_len as usize + 28;
        vec![0u8; 64 - (header_bytes % 16)]
    } else {
        0u32.to_be_bytes().to_vec()
    };

    let mut list = vec![
        ProgramCallParameter::input(qualified),
        ProgramCallParameter::input(function_name),
        ProgramCallParameter::input(return_format),
        ProgramCallParameter::input(pass_by),
        ProgramCallParameter::input(arg_count),
        ProgramCallParameter::input_output(aligner, 0),
        ProgramCallParameter::output(receiver_len),
    ];
    for param in parameters.iter() {
        list.push(ProgramCallParameter::input_output(
            param.data().to_vec(),
            param.effective_max_length(),
        ));
    }
    ProgramCallParameters::new(list)
}

/// Decode the trampoline's receiver into the caller's result fields.
fn decode_return_value(
    parameters: &mut ServiceProgramCallParameters,
    trampoline: &ProgramCallParameters,
) {
    use crate::params::ReturnFormat;

    let receiver = trampoline.get(6).map(|p| p.data()).unwrap_or_default();
    parameters.integer_value = 0;
    parameters.errno = 0;
    parameters.pointer = [0; 16];

    match parameters.return_format {
        ReturnFormat::None => {}
        ReturnFormat::Integer => {
            parameters.integer_value = codec::read_u32(receiver, 0);
        }
        ReturnFormat::IntegerErrno => {
            parameters.integer_value = codec::read_u32(receiver, 0);
            parameters.errno = codec::read_u32(receiver, 4);
        }
        ReturnFormat::Pointer => {
            let len = receiver.len().min(16);
            parameters.pointer[..len].copy_from_slice(&receiver[..len]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ebcdic::CP037;
    use crate::params::{ReturnFormat, ServiceProgramCallParameter};

    #[test]
    fn message_option_tracks_datastream_level() {
        assert_eq!(message_option(0), 0);
        assert_eq!(message_option(6), 0);
        assert_eq!(message_option(7), 2);
        assert_eq!(message_option(9), 2);
        assert_eq!(message_option(10), 4);
        assert_eq!(message_option(12), 4);
    }

    #[test]
    fn command_request_ebcdic_form() {
        let req = build_command_request("DSPJOB", 7, &CP037);
        // Header: template length 1, ReqRep 0x1002.
        assert_eq!(codec::read_u16(&req, 2), SERVER_COMMAND);
        assert_eq!(codec::read_u16(&req, 12), 1);
        assert_eq!(codec::read_u16(&req, 14), REQREP_RC_RUN_COMMAND);
        // Template: message option 2 at level 7.
        assert_eq!(req[16], 2);
        // Field: LL = 6 + 6 text bytes, CP 0x1101, EBCDIC text.
        assert_eq!(codec::read_u32(&req, 17), 12);
        assert_eq!(codec::read_u16(&req, 21), CP_COMMAND_EBCDIC);
        assert_eq!(&req[23..29], &CP037.encode("DSPJOB")[..]);
    }

    #[test]
    fn command_request_unicode_form() {
        let req = build_command_request("WRKACTJOB", 11, &CP037);
        assert_eq!(req[16], 4);
        let text_len = "WRKACTJOB".len() as u32 * 2;
        assert_eq!(codec::read_u32(&req, 17), 10 + text_len);
        assert_eq!(codec::read_u16(&req, 21), CP_COMMAND_UNICODE);
        assert_eq!(codec::read_u32(&req, 23), 1200);
        assert_eq!(codec::read_u16(&req, 27), u16::from(b'W'));
    }

    #[test]
    fn program_request_template() {
        let params = ProgramCallParameters::new(vec![
            ProgramCallParameter::output(100),
            ProgramCallParameter::input(100u32.to_be_bytes().to_vec()),
        ]);
        let req = build_program_request("QWCRSVAL", "QSYS", &params, 8, &CP037);

        assert_eq!(codec::read_u16(&req, 12), 23);
        assert_eq!(codec::read_u16(&req, 14), REQREP_RC_CALL_PROGRAM);
        assert_eq!(&req[16..26], &encode_name("QWCRSVAL", 10, &CP037)[..]);
        assert_eq!(&req[26..36], &encode_name("QSYS", 10, &CP037)[..]);
        assert_eq!(req[36], 2); // message option at level 8
        assert_eq!(codec::read_u16(&req, 37), 2); // parameter count

        // First block: output of max 100, no payload.
        assert_eq!(codec::read_u32(&req, 39), 12);
        assert_eq!(codec::read_u16(&req, 43), CP_PROGRAM_PARAMETER);
        assert_eq!(codec::read_u32(&req, 45), 100);
        assert_eq!(codec::read_u16(&req, 49), ParameterType::Output as u16);
        // Second block: 4 input bytes.
        assert_eq!(codec::read_u32(&req, 51), 16);
        assert_eq!(codec::read_u16(&req, 61), ParameterType::Input as u16);
        assert_eq!(codec::read_u32(&req, 63), 100);
    }

    #[test]
    fn null_parameter_downgrades_below_level_six() {
        let params = ProgramCallParameters::new(vec![ProgramCallParameter::null()]);

        let old = build_program_request("PGM", "LIB", &params, 5, &CP037);
        assert_eq!(codec::read_u32(&old, 39), 12);
        assert_eq!(codec::read_u16(&old, 49), 1);

        let new = build_program_request("PGM", "LIB", &params, 6, &CP037);
        assert_eq!(codec::read_u16(&new, 49), ParameterType::Null as u16);
    }

    fn reply_with_blocks(blocks: &[(u32, Vec<u8>)]) -> Vec<u8> {
        let mut frame = vec![0u8; 24];
        for (max_len, data) in blocks {
            let mut ds = DataStream::new();
            ds.write_u32(12 + data.len() as u32);
            ds.write_u16(CP_PROGRAM_PARAMETER);
            ds.write_u32(*max_len);
            ds.write_u16(ParameterType::Output as u16);
            ds.write_bytes(data);
            frame.extend_from_slice(&ds.into_vec());
        }
        frame
    }

    #[test]
    fn output_parameters_update_in_place() {
        let mut params = ProgramCallParameters::new(vec![
            ProgramCallParameter::output(100),
            ProgramCallParameter::input(vec![1, 2, 3]),
            ProgramCallParameter::input_output(vec![9], 8),
        ]);
        let payload = vec![0x5A; 100];
        let frame = reply_with_blocks(&[(100, payload.clone()), (8, vec![7, 7])]);

        apply_output_parameters(&frame, &mut params);
        assert_eq!(params.get(0).unwrap().data(), &payload[..]);
        // Input parameter untouched, skipped in the scan.
        assert_eq!(params.get(1).unwrap().data(), &[1, 2, 3]);
        assert_eq!(params.get(2).unwrap().data(), &[7, 7]);
    }

    #[test]
    fn output_scan_stops_at_sentinels() {
        let mut params = ProgramCallParameters::new(vec![
            ProgramCallParameter::output(4),
            ProgramCallParameter::output(4),
        ]);

        let mut frame = reply_with_blocks(&[(4, vec![1, 2, 3, 4])]);
        frame.extend_from_slice(&FRAME_IDLE_MARKER.to_be_bytes());
        frame.extend_from_slice(&[0xFF; 8]);
        apply_output_parameters(&frame, &mut params);
        assert_eq!(params.get(0).unwrap().data(), &[1, 2, 3, 4]);
        assert!(params.get(1).unwrap().data().is_empty());

        // Truncated frame: scan stops without touching anything.
        let mut params = ProgramCallParameters::new(vec![ProgramCallParameter::output(4)]);
        apply_output_parameters(&[0u8; 26], &mut params);
        assert!(params.get(0).unwrap().data().is_empty());
    }

    #[test]
    fn trampoline_layout() {
        let caller = ServiceProgramCallParameters::new(
            vec![
                ServiceProgramCallParameter::by_value(42u32.to_be_bytes().to_vec()),
                ServiceProgramCallParameter::by_reference(b"XYZ".to_vec(), 3),
            ],
            ReturnFormat::Integer,
        );
        let built = build_trampoline_parameters("QZLSOLST", "QSYS", "open", &caller, &CP037);

        assert_eq!(built.len(), 9);
        assert_eq!(built.get(0).unwrap().data().len(), 20);
        // Function name is NUL-terminated EBCDIC.
        let f = built.get(1).unwrap().data();
        assert_eq!(f.len(), 5);
        assert_eq!(f[4], 0);
        assert_eq!(built.get(2).unwrap().data(), &1u32.to_be_bytes()[..]);
        assert_eq!(
            built.get(3).unwrap().data(),
            &[0, 0, 0, 1, 0, 0, 0, 2][..]
        );
        assert_eq!(built.get(4).unwrap().data(), &[0, 0, 0, 2][..]);
        assert_eq!(built.get(6).unwrap().effective_max_length(), 4);
        assert_eq!(built.get(7).unwrap().data(), &42u32.to_be_bytes()[..]);
        assert_eq!(built.get(8).unwrap().data(), b"XYZ");
    }

    #[test]
    fn trampoline_empty_argument_list() {
        let caller = ServiceProgramCallParameters::new(vec![], ReturnFormat::None);
        let built = build_trampoline_parameters("SRV", "LIB", "fn", &caller, &CP037);
        assert_eq!(built.len(), 7);
        // Single zero word for the pass-by list, zero argument count.
        assert_eq!(built.get(3).unwrap().data(), &[0, 0, 0, 0][..]);
        assert_eq!(built.get(4).unwrap().data(), &[0, 0, 0, 0][..]);
        // No alignment requested: 4-byte zero aligner.
        assert_eq!(built.get(5).unwrap().data().len(), 4);
    }

    #[test]
    fn aligner_pad_formula() {
        // function "fnnam" + NUL = 6, pass-by 2*4 = 8, receiver 4,
        // fixed 28 → 46 % 16 = 14 → pad 50.
        let mut caller = ServiceProgramCallParameters::new(
            vec![
                ServiceProgramCallParameter::by_value(vec![0; 4]),
                ServiceProgramCallParameter::by_value(vec![0; 4]),
            ],
            ReturnFormat::Integer,
        );
        caller.align_receiver_16 = true;
        let built = build_trampoline_parameters("SRV", "LIB", "fnnam", &caller, &CP037);
        assert_eq!(built.get(5).unwrap().data().len(), 50);

        // 8-byte function name block (7 chars + NUL), 8 pass-by, 4
        // receiver → 48 % 16 = 0 → pad 64.
        let built = build_trampoline_parameters("SRV", "LIB", "sevench", &caller, &CP037);
        assert_eq!(built.get(5).unwrap().data().len(), 64);
    }

    #[test]
    fn return_value_decoding() {
        let mut caller =
            ServiceProgramCallParameters::new(vec![], ReturnFormat::IntegerErrno);
        let trampoline = ProgramCallParameters::new(vec![
            ProgramCallParameter::null(),
            ProgramCallParameter::null(),
            ProgramCallParameter::null(),
            ProgramCallParameter::null(),
            ProgramCallParameter::null(),
            ProgramCallParameter::null(),
            ProgramCallParameter::input(vec![0, 0, 0, 5, 0, 0, 0, 13]),
        ]);
        decode_return_value(&mut caller, &trampoline);
        assert_eq!(caller.integer_value, 5);
        assert_eq!(caller.errno, 13);

        caller.return_format = ReturnFormat::Pointer;
        decode_return_value(&mut caller, &trampoline);
        assert_eq!(&caller.pointer[..8], &[0, 0, 0, 5, 0, 0, 0, 13]);
        assert_eq!(caller.integer_value, 0);
    }
}
