//! Reading and writing Pd patch text.
//!
//! Only two records matter: `#X obj <x> <y> <type> <arg>*;` adds a member and
//! `#X connect <src> <outlet> <dst> <inlet>;` wires two members by declaration
//! order. Everything else is skipped so richer patch dialects still load.
use std::{
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};
use thiserror::Error;
use tracing::{debug, error, trace};

use crate::{
    circuit::{Circuit, Position},
    message::{Atom, Message},
    registry::lookup_gadget,
};

/// Canvas header written in front of every serialized patch.
pub const CANVAS_HEADER: &str = "#N canvas 0 50 450 300 10;";

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("line {line}: unknown gadget `{name}`")]
    UnknownGadget { line: usize, name: String },

    #[error("line {line}: malformed `{keyword}` record: {reason}")]
    Malformed {
        line: usize,
        keyword: String,
        reason: String,
    },

    #[error("line {line}: member {member} is not declared yet ({declared} declared so far)")]
    UndeclaredMember {
        line: usize,
        member: usize,
        declared: usize,
    },

    #[error("line {line}: member {member} (`{kind}`) has no {side} {port}")]
    NoSuchPort {
        line: usize,
        member: usize,
        kind: String,
        side: &'static str,
        port: usize,
    },

    #[error("member {member} cannot be written as an object: {reason}")]
    Unwritable { member: usize, reason: String },

    #[error("cannot read patch file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The body of a `#X ...;` record, if `line` is one.
fn record_body(line: &str) -> Option<&str> {
    line.trim().strip_prefix("#X ")?.strip_suffix(';')
}

fn parse_index(line: usize, keyword: &str, what: &str, token: &str) -> Result<usize, PatchError> {
    token.parse().map_err(|_| PatchError::Malformed {
        line,
        keyword: keyword.to_string(),
        reason: format!("{what} `{token}` is not a valid index"),
    })
}

fn parse_coordinate(line: usize, token: &str) -> Result<i64, PatchError> {
    token.parse().map_err(|_| PatchError::Malformed {
        line,
        keyword: "obj".to_string(),
        reason: format!("coordinate `{token}` is not an integer"),
    })
}

/// Build a circuit from patch text. Any error discards the whole circuit.
pub fn parse_patch(text: &str) -> Result<Rc<Circuit>, PatchError> {
    let circuit = Circuit::new();
    for (n, raw) in text.lines().enumerate() {
        let line = n + 1;
        let Some(body) = record_body(raw) else {
            continue;
        };
        let tokens: Vec<&str> = body.split_whitespace().collect();
        match tokens.first().copied() {
            Some("obj") => add_object(&circuit, line, &tokens)?,
            Some("connect") => add_connection(&circuit, line, &tokens)?,
            other => trace!(line, keyword = other.unwrap_or_default(), "skipping record"),
        }
    }
    debug!(
        members = circuit.len(),
        wires = circuit.wires().len(),
        "patch parsed"
    );
    Ok(circuit)
}

fn add_object(circuit: &Circuit, line: usize, tokens: &[&str]) -> Result<(), PatchError> {
    let [_, x, y, name, rest @ ..] = tokens else {
        return Err(PatchError::Malformed {
            line,
            keyword: "obj".to_string(),
            reason: "expected `obj <x> <y> <type> <arg>*`".to_string(),
        });
    };
    let position = Position {
        x: parse_coordinate(line, x)?,
        y: parse_coordinate(line, y)?,
    };
    let args: Message = rest.iter().map(|token| Atom::from_token(token)).collect();
    let Some(gadget) = lookup_gadget(name, args) else {
        error!(line, name, "unknown gadget in patch");
        return Err(PatchError::UnknownGadget {
            line,
            name: name.to_string(),
        });
    };
    circuit.add_at(gadget, position);
    Ok(())
}

fn add_connection(circuit: &Circuit, line: usize, tokens: &[&str]) -> Result<(), PatchError> {
    let [_, src, outlet, dst, inlet] = tokens else {
        return Err(PatchError::Malformed {
            line,
            keyword: "connect".to_string(),
            reason: "expected `connect <src> <outlet> <dst> <inlet>`".to_string(),
        });
    };
    let src = parse_index(line, "connect", "source member", src)?;
    let outlet = parse_index(line, "connect", "outlet", outlet)?;
    let dst = parse_index(line, "connect", "destination member", dst)?;
    let inlet = parse_index(line, "connect", "inlet", inlet)?;

    let declared = circuit.len();
    let member = |index: usize| {
        circuit
            .member(index)
            .ok_or(PatchError::UndeclaredMember {
                line,
                member: index,
                declared,
            })
    };
    let from = member(src)?;
    let to = member(dst)?;
    if outlet >= from.num_outlets() {
        return Err(PatchError::NoSuchPort {
            line,
            member: src,
            kind: from.kind().to_string(),
            side: "outlet",
            port: outlet,
        });
    }
    if inlet >= to.num_inlets() {
        return Err(PatchError::NoSuchPort {
            line,
            member: dst,
            kind: to.kind().to_string(),
            side: "inlet",
            port: inlet,
        });
    }
    circuit.add_wire(src, outlet, dst, inlet);
    Ok(())
}

/// Render a circuit as patch text.
///
/// Members become `#X obj` records in member order and every wire added
/// through the circuit becomes a `#X connect` record. Connections made
/// directly between gadgets are not known to the circuit and are not written.
/// Arguments are written token for token, exactly as the parser reads them.
pub fn write_patch(circuit: &Circuit) -> Result<String, PatchError> {
    let mut out = String::new();
    out.push_str(CANVAS_HEADER);
    out.push('\n');
    for index in 0..circuit.len() {
        let Some(member) = circuit.member(index) else {
            continue;
        };
        if member.as_circuit().is_some() {
            return Err(unwritable(index, "it is a nested circuit"));
        }
        let position = circuit.position(index).unwrap_or_default();
        out.push_str(&format!("#X obj {} {} {}", position.x, position.y, member.kind()));
        for atom in member.args() {
            out.push(' ');
            out.push_str(&arg_token(index, atom)?);
        }
        out.push_str(";\n");
    }
    for wire in circuit.wires() {
        out.push_str(&format!(
            "#X connect {} {} {} {};\n",
            wire.src, wire.outlet, wire.dst, wire.inlet
        ));
    }
    Ok(out)
}

fn unwritable(member: usize, reason: impl Into<String>) -> PatchError {
    PatchError::Unwritable {
        member,
        reason: reason.into(),
    }
}

/// One argument as a patch token. The record grammar has no quoting, so only
/// atoms that read back as themselves can be written.
fn arg_token(member: usize, atom: &Atom) -> Result<String, PatchError> {
    match atom {
        Atom::Int(n) => Ok(n.to_string()),
        Atom::Str(s) if s.is_empty() => Err(unwritable(member, "empty string argument")),
        Atom::Str(s) if s.contains(char::is_whitespace) => {
            Err(unwritable(member, format!("argument `{s}` does not fit in one token")))
        }
        Atom::Str(s) if s.parse::<i64>().is_ok() => Err(unwritable(
            member,
            format!("string argument `{s}` would read back as an int"),
        )),
        Atom::Str(s) => Ok(s.clone()),
        Atom::List(_) => Err(unwritable(member, "nested list argument")),
    }
}

/// Read and parse a patch file.
pub fn load_patch_file(path: impl AsRef<Path>) -> Result<Rc<Circuit>, PatchError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loading patch");
    parse_patch(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{debug::capture_debug, gadget::Gadgetry, msg};

    // this came straight out of the Pd-extended patch editor
    const SWAP_PATCH: &str = "
#N canvas 673 402 450 300 10;
#X obj 75 101 swap 123;
#X obj 75 142 print 1;
#X obj 146 142 print 2;
#X obj 75 60 inlet;
#X connect 0 0 1 0;
#X connect 0 1 2 0;
#X connect 3 0 0 0;
";

    #[test]
    fn test_swap_patch() {
        let out = capture_debug();
        let c = parse_patch(SWAP_PATCH).unwrap();

        c.feed(0, msg![11]);
        c.feed(0, msg![22]);

        assert_eq!(out.contents(), "2 11\n1 123\n2 22\n1 123\n");
        assert_eq!(c.len(), 4);
        assert_eq!(c.position(2), Some(Position { x: 146, y: 142 }));
    }

    #[test]
    fn test_other_records_are_ignored() {
        let text = "#N canvas 0 0 450 300 10;\n\
                    #X text 10 10 a comment;\n\
                    #X msg 10 40 hello;\n\
                    #X obj 10 70 pass\n\
                    obj 1 2 pass;\n\
                    #X obj 10 100 print;\r\n";
        let c = parse_patch(text).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c.member(0).unwrap().kind(), "print");
    }

    #[test]
    fn test_unknown_gadget_is_an_error() {
        let err = parse_patch("#X obj 0 0 pass;\n#X obj 0 0 nosuch 1 2;\n").unwrap_err();
        assert!(matches!(
            err,
            PatchError::UnknownGadget { line: 2, ref name } if name == "nosuch"
        ));
        assert_eq!(err.to_string(), "line 2: unknown gadget `nosuch`");
    }

    #[test]
    fn test_connect_before_declaration_is_an_error() {
        let err = parse_patch("#X obj 0 0 pass;\n#X connect 0 0 1 0;\n#X obj 0 0 print;\n").unwrap_err();
        assert!(matches!(
            err,
            PatchError::UndeclaredMember { line: 2, member: 1, declared: 1 }
        ));
    }

    #[test]
    fn test_malformed_records_are_errors() {
        assert!(matches!(
            parse_patch("#X obj 10 20;").unwrap_err(),
            PatchError::Malformed { line: 1, .. }
        ));
        assert!(matches!(
            parse_patch("#X obj left 20 pass;").unwrap_err(),
            PatchError::Malformed { .. }
        ));
        assert!(matches!(
            parse_patch("#X obj 0 0 pass;\n#X connect 0 0 0;").unwrap_err(),
            PatchError::Malformed { line: 2, .. }
        ));
        assert!(matches!(
            parse_patch("#X obj 0 0 pass;\n#X connect 0 x 0 0;").unwrap_err(),
            PatchError::Malformed { line: 2, .. }
        ));
    }

    #[test]
    fn test_missing_port_is_an_error() {
        let err = parse_patch("#X obj 0 0 pass;\n#X obj 0 0 print;\n#X connect 1 0 0 0;").unwrap_err();
        assert!(matches!(
            err,
            PatchError::NoSuchPort { line: 3, member: 1, side: "outlet", port: 0, .. }
        ));
    }

    #[test]
    fn test_write_patch_roundtrip() {
        let c = parse_patch(SWAP_PATCH).unwrap();
        let text = write_patch(&c).unwrap();
        assert_eq!(
            text,
            "#N canvas 0 50 450 300 10;\n\
             #X obj 75 101 swap 123;\n\
             #X obj 75 142 print 1;\n\
             #X obj 146 142 print 2;\n\
             #X obj 75 60 inlet;\n\
             #X connect 0 0 1 0;\n\
             #X connect 0 1 2 0;\n\
             #X connect 3 0 0 0;\n"
        );

        let out = capture_debug();
        let again = parse_patch(&text).unwrap();
        again.feed(0, msg![5]);
        assert_eq!(out.contents(), "2 5\n1 123\n");
    }

    #[test]
    fn test_nested_circuits_cannot_be_written() {
        let c = Circuit::new();
        c.add(Circuit::new());
        assert!(matches!(write_patch(&c), Err(PatchError::Unwritable { member: 0, .. })));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = load_patch_file("/definitely/not/here.pd").unwrap_err();
        assert!(matches!(err, PatchError::Io { .. }));
    }

    #[test]
    fn test_escaped_arguments_survive_a_rewrite() {
        let c = parse_patch("#X obj 0 0 print \\$0-x;\n#X obj 5 5 swap \\, -3;\n").unwrap();
        let text = write_patch(&c).unwrap();
        assert_eq!(
            text,
            "#N canvas 0 50 450 300 10;\n#X obj 0 0 print \\$0-x;\n#X obj 5 5 swap \\, -3;\n"
        );
        let again = parse_patch(&text).unwrap();
        assert_eq!(again.member(0).unwrap().args(), &msg!["\\$0-x"]);
        assert_eq!(again.member(1).unwrap().args(), &msg!["\\,", -3]);
    }

    #[test]
    fn test_arguments_that_cannot_be_tokens_are_unwritable() {
        for args in [msg!["7"], msg!["a b"], msg![""], msg![1, msg![2, 3]]] {
            let c = Circuit::new();
            c.add(lookup_gadget("print", args.clone()).unwrap());
            assert!(
                matches!(write_patch(&c), Err(PatchError::Unwritable { member: 0, .. })),
                "{args:?} should not be writable"
            );
        }
    }
}
