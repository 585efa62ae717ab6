use crate::common::{data::Data, error::Error};
use crate::vm::heap::{Composite, Heap};

/// A built-in function. Builtins take their arguments by value and may
/// allocate on the heap; anything they allocate and hand back is retained
/// so a collection between the call and the caller's use can't sweep it.
pub type Builtin = fn(&mut Heap, Vec<Data>) -> Result<Data, Error>;

/// Resolves a call target against the standard library. Consulted before
/// the user function table, so these names can not be shadowed by `def`.
pub fn lookup(name: &str) -> Option<Builtin> {
    Some(match name {
        "print" => print,
        "len" => len,
        "range" => range,
        "abs" => abs,
        "floor" => floor,
        "sqrt" => sqrt,
        "sin" => sin,
        "cos" => cos,
        "tan" => tan,
        "upper" => upper,
        "lower" => lower,
        "split" => split,
        "join" => join,
        "levy" => levy,
        _ => return None,
    })
}

fn arity(name: &str, expected: usize, args: &[Data]) -> Result<(), Error> {
    if args.len() != expected {
        return Err(Error::runtime(&format!(
            "`{}` takes {} argument{}, got {}",
            name,
            expected,
            if expected == 1 { "" } else { "s" },
            args.len(),
        )));
    }
    Ok(())
}

fn number(name: &str, arg: &Data) -> Result<f64, Error> {
    match arg {
        Data::Number(n) => Ok(*n),
        other => Err(Error::new(
            crate::common::error::ErrorKind::Type,
            &format!("`{}` expects a number, got a {}", name, other.type_name()),
        )),
    }
}

fn string<'a>(name: &str, arg: &'a Data) -> Result<&'a str, Error> {
    match arg {
        Data::String(s) => Ok(s),
        other => Err(Error::new(
            crate::common::error::ErrorKind::Type,
            &format!("`{}` expects a string, got a {}", name, other.type_name()),
        )),
    }
}

fn print(heap: &mut Heap, args: Vec<Data>) -> Result<Data, Error> {
    let rendered: Vec<String> = args
        .iter()
        .map(|arg| match arg {
            Data::List(handle) => match heap.get(*handle) {
                Ok(Composite::List(items)) => {
                    let inner: Vec<String> =
                        items.iter().map(|item| item.to_string()).collect();
                    Ok(format!("[{}]", inner.join(", ")))
                },
                Err(error) => Err(error),
            },
            other => Ok(other.to_string()),
        })
        .collect::<Result<_, _>>()?;

    println!("{}", rendered.join(" "));
    Ok(Data::Unit)
}

fn len(heap: &mut Heap, args: Vec<Data>) -> Result<Data, Error> {
    arity("len", 1, &args)?;
    match &args[0] {
        Data::String(s) => Ok(Data::Number(s.chars().count() as f64)),
        Data::List(handle) => {
            let Composite::List(items) = heap.get(*handle)?;
            Ok(Data::Number(items.len() as f64))
        },
        other => Err(Error::runtime(&format!(
            "`len` expects a string or a list, got a {}",
            other.type_name(),
        ))),
    }
}

/// `range(stop)` or `range(start, stop)`, by ones, stop exclusive.
fn range(heap: &mut Heap, args: Vec<Data>) -> Result<Data, Error> {
    let (start, stop) = match args.len() {
        1 => (0.0, number("range", &args[0])?),
        2 => (number("range", &args[0])?, number("range", &args[1])?),
        n => {
            return Err(Error::runtime(&format!(
                "`range` takes 1 or 2 arguments, got {}",
                n,
            )))
        },
    };

    let mut items = vec![];
    let mut current = start;
    while current < stop {
        items.push(Data::Number(current));
        current += 1.0;
    }

    let handle = heap.alloc(Composite::List(items))?;
    heap.retain(handle);
    Ok(Data::List(handle))
}

fn abs(_: &mut Heap, args: Vec<Data>) -> Result<Data, Error> {
    arity("abs", 1, &args)?;
    Ok(Data::Number(number("abs", &args[0])?.abs()))
}

fn floor(_: &mut Heap, args: Vec<Data>) -> Result<Data, Error> {
    arity("floor", 1, &args)?;
    Ok(Data::Number(number("floor", &args[0])?.floor()))
}

fn sqrt(_: &mut Heap, args: Vec<Data>) -> Result<Data, Error> {
    arity("sqrt", 1, &args)?;
    Ok(Data::Number(number("sqrt", &args[0])?.sqrt()))
}

fn sin(_: &mut Heap, args: Vec<Data>) -> Result<Data, Error> {
    arity("sin", 1, &args)?;
    Ok(Data::Number(number("sin", &args[0])?.sin()))
}

fn cos(_: &mut Heap, args: Vec<Data>) -> Result<Data, Error> {
    arity("cos", 1, &args)?;
    Ok(Data::Number(number("cos", &args[0])?.cos()))
}

fn tan(_: &mut Heap, args: Vec<Data>) -> Result<Data, Error> {
    arity("tan", 1, &args)?;
    Ok(Data::Number(number("tan", &args[0])?.tan()))
}

fn upper(_: &mut Heap, args: Vec<Data>) -> Result<Data, Error> {
    arity("upper", 1, &args)?;
    Ok(Data::String(string("upper", &args[0])?.to_uppercase()))
}

fn lower(_: &mut Heap, args: Vec<Data>) -> Result<Data, Error> {
    arity("lower", 1, &args)?;
    Ok(Data::String(string("lower", &args[0])?.to_lowercase()))
}

fn split(heap: &mut Heap, args: Vec<Data>) -> Result<Data, Error> {
    arity("split", 2, &args)?;
    let text = string("split", &args[0])?;
    let separator = string("split", &args[1])?;

    let items: Vec<Data> = text
        .split(separator)
        .map(|part| Data::String(part.to_string()))
        .collect();

    let handle = heap.alloc(Composite::List(items))?;
    heap.retain(handle);
    Ok(Data::List(handle))
}

fn join(heap: &mut Heap, args: Vec<Data>) -> Result<Data, Error> {
    arity("join", 2, &args)?;
    let handle = match &args[0] {
        Data::List(handle) => *handle,
        other => {
            return Err(Error::runtime(&format!(
                "`join` expects a list, got a {}",
                other.type_name(),
            )))
        },
    };
    let separator = string("join", &args[1])?.to_string();

    let Composite::List(items) = heap.get(handle)?;
    let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
    Ok(Data::String(parts.join(&separator)))
}

/// `levy(wealth, threshold)`: a flat 2.5% levy on wealth at or above the
/// threshold, zero below it.
fn levy(_: &mut Heap, args: Vec<Data>) -> Result<Data, Error> {
    arity("levy", 2, &args)?;
    let wealth = number("levy", &args[0])?;
    let threshold = number("levy", &args[1])?;

    let due = if wealth >= threshold { wealth * 0.025 } else { 0.0 };
    Ok(Data::Number(due))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_names_resolve_to_none() {
        assert!(lookup("print").is_some());
        assert!(lookup("frobnicate").is_none());
    }

    #[test]
    fn len_of_string_counts_chars() {
        let mut heap = Heap::new();
        let result = len(&mut heap, vec![Data::String("héllo".to_string())]).unwrap();
        assert_eq!(result, Data::Number(5.0));
    }

    #[test]
    fn range_allocates_a_retained_list() {
        let mut heap = Heap::new();
        let result = range(&mut heap, vec![Data::Number(3.0)]).unwrap();

        let handle = match result {
            Data::List(handle) => handle,
            other => panic!("expected a list, got {}", other),
        };
        assert_eq!(
            heap.get(handle).unwrap(),
            &Composite::List(vec![
                Data::Number(0.0),
                Data::Number(1.0),
                Data::Number(2.0),
            ]),
        );

        // the result is rooted, so a collection must not sweep it
        assert_eq!(heap.collect(&[]), 0);
    }

    #[test]
    fn range_with_start_and_stop() {
        let mut heap = Heap::new();
        let result =
            range(&mut heap, vec![Data::Number(2.0), Data::Number(5.0)]).unwrap();
        let Data::List(handle) = result else { panic!() };
        let Composite::List(items) = heap.get(handle).unwrap();
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn split_then_join_restores_the_string() {
        let mut heap = Heap::new();
        let parts = split(
            &mut heap,
            vec![
                Data::String("a,b,c".to_string()),
                Data::String(",".to_string()),
            ],
        )
        .unwrap();
        let joined = join(&mut heap, vec![parts, Data::String(",".to_string())]).unwrap();
        assert_eq!(joined, Data::String("a,b,c".to_string()));
    }

    #[test]
    fn trig_table_is_complete() {
        let mut heap = Heap::new();
        let angle = 0.5f64;
        assert_eq!(
            tan(&mut heap, vec![Data::Number(angle)]).unwrap(),
            Data::Number(angle.tan()),
        );
        assert!(lookup("tan").is_some());
    }

    #[test]
    fn levy_applies_above_threshold_only() {
        let mut heap = Heap::new();
        let below =
            levy(&mut heap, vec![Data::Number(100.0), Data::Number(1000.0)]).unwrap();
        assert_eq!(below, Data::Number(0.0));

        let above =
            levy(&mut heap, vec![Data::Number(2000.0), Data::Number(1000.0)]).unwrap();
        assert_eq!(above, Data::Number(50.0));
    }

    #[test]
    fn arity_errors_are_runtime_errors() {
        let mut heap = Heap::new();
        let error = sqrt(&mut heap, vec![]).unwrap_err();
        assert_eq!(error.kind, crate::common::error::ErrorKind::Runtime);
    }
}
