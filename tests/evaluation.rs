use std::sync::atomic::{AtomicUsize, Ordering};
use tramp_lisp::descriptor::TypeDescriptor;
use tramp_lisp::heap::Heap;
use tramp_lisp::printer::{pr_str, PrintMode};
use tramp_lisp::types::ObjRef;
use tramp_lisp::{Config, Error, Interpreter, Value};

fn eval(interp: &mut Interpreter, source: &str) -> String {
    match interp.eval_str(source) {
        Ok(v) => pr_str(&mut interp.heap, v, PrintMode::ReadableRepresentation),
        Err(e) => panic!("{} failed: {}", source, interp.describe(&e)),
    }
}

fn eval_fresh(source: &str) -> String {
    eval(&mut Interpreter::new(), source)
}

#[test]
fn tail_calls_run_in_constant_space() {
    let config = Config {
        step_budget: 1000,
        collect_between_forms: false,
        ..Config::default()
    };
    let mut interp = Interpreter::with_config(config.clone());
    let result = eval(
        &mut interp,
        "(define (count-down n acc)
           (if (= n 0) acc (count-down (- n 1) (+ acc 1))))
         (count-down 1000000 0)",
    );
    assert_eq!(result, "1000000");
    assert!(interp.heap.len() < 10_000, "heap grew to {}", interp.heap.len());

    // Without in-evaluation collection every call's environment is still there.
    let mut uncollected = Interpreter::with_config(Config {
        step_budget: 0,
        ..config
    });
    eval(
        &mut uncollected,
        "(define (count-down n acc)
           (if (= n 0) acc (count-down (- n 1) (+ acc 1))))
         (count-down 20000 0)",
    );
    assert!(uncollected.heap.len() > 20_000, "heap held {}", uncollected.heap.len());
}

#[test]
fn tail_position_inside_derived_forms() {
    let result = eval_fresh(
        "(define (walk n)
           (cond ((= n 0) 'done)
                 (else (let ((m (- n 1))) (when #t (walk m))))))
         (walk 50000)",
    );
    assert_eq!(result, "done");
}

#[test]
fn closures_capture_their_environment() {
    assert_eq!(
        eval_fresh("(define (make-adder n) (lambda (x) (+ x n))) ((make-adder 3) 4)"),
        "7"
    );
    assert_eq!(eval_fresh("(((lambda (x) (lambda (y) (+ x y))) 3) 4)"), "7");
    assert_eq!(
        eval_fresh(
            "(define (counter)
               (define n 0)
               (lambda () (set! n (+ n 1)) n))
             (define c (counter))
             (c) (c) (c)"
        ),
        "3"
    );
}

#[test]
fn symbols_are_interned() {
    assert_eq!(eval_fresh("(eq? 'abc (string->symbol \"abc\"))"), "#t");
    assert_eq!(eval_fresh("(eq? 'abc 'abd)"), "#f");
}

#[test]
fn definitions_shadow_and_assignment_mutates() {
    assert_eq!(
        eval_fresh("(define x 1) (define (f) (define x 2) x) (list (f) x)"),
        "(2 1)"
    );
    assert_eq!(eval_fresh("(define y 1) (set! y 5) y"), "5");
    assert_eq!(
        eval_fresh("(define z 1) (define (g) (set! z 9)) (g) z"),
        "9"
    );

    let mut interp = Interpreter::new();
    assert!(matches!(
        interp.eval_str("(set! never-defined 1)"),
        Err(Error::UnboundVariable(_))
    ));
    assert!(interp.lookup_global("never-defined").is_none());
}

#[test]
fn quasiquote_splices_and_nests() {
    assert_eq!(
        eval_fresh("(define b 2) (define rest '(3 4)) `(1 ,b ,@rest)"),
        "(1 2 3 4)"
    );
    assert_eq!(eval_fresh("`(1 ,(+ 1 1) ,@(list 3 4))"), "(1 2 3 4)");
    assert_eq!(eval_fresh("`(0 ,@'() 1)"), "(0 1)");
    assert_eq!(eval_fresh("`#(1 ,(+ 1 1))"), "#(1 2)");
    assert_eq!(eval_fresh("`(1 . ,(+ 1 1))"), "(1 . 2)");
    assert_eq!(
        eval_fresh("`(a `(b ,(c ,(+ 1 2))))"),
        "(a (quasiquote (b (unquote (c 3)))))"
    );
}

#[test]
fn call_cc_escapes_from_nested_evaluation() {
    assert_eq!(
        eval_fresh("(+ 1 (call/cc (lambda (k) (+ 2 (k 10)))))"),
        "11"
    );
    assert_eq!(
        eval_fresh("(+ 1 (call/cc (lambda (k) (k 10) 999)))"),
        "11"
    );
    assert_eq!(
        eval_fresh("(let ((x (call/cc (lambda (k) (k 5))))) (* x 2))"),
        "10"
    );
    assert_eq!(
        eval_fresh("(define (f) (begin (display \"\") (call/cc (lambda (k) (k 'out))))) (list (f))"),
        "(out)"
    );
    assert_eq!(
        eval_fresh("(call-with-current-continuation (lambda (k) 42))"),
        "42"
    );
}

#[test]
fn call_cc_escapes_from_procedures_run_by_primitives() {
    assert_eq!(
        eval_fresh("(map (lambda (x) (call/cc (lambda (k) (k (* x 2))))) '(1 2 3))"),
        "(2 4 6)"
    );
    assert_eq!(
        eval_fresh(
            "(define kept '())
             (for-each
               (lambda (x)
                 (call/cc
                   (lambda (skip)
                     (if (= (remainder x 2) 1) (skip #f))
                     (set! kept (cons x kept)))))
               '(1 2 3 4))
             (reverse kept)"
        ),
        "(4 2)"
    );
    assert_eq!(
        eval_fresh(
            "(map (lambda (x)
                    (call/cc
                      (lambda (k)
                        (map (lambda (y) (if (= y x) (k (* 10 y)) y)) '(1 2 3)))))
                  '(1 2))"
        ),
        "(10 20)"
    );
    assert_eq!(
        eval_fresh(
            "(list 'r (call/cc (lambda (k) (map (lambda (x) (if (= x 2) (k x) x)) '(1 2 3)))))"
        ),
        "(r 2)"
    );
}

#[test]
fn escaping_across_procedure_environments() {
    assert_eq!(
        eval_fresh(
            "(define (first-negative items)
               (call/cc (lambda (return)
                 (define (scan rest)
                   (if (null? rest)
                       #f
                       (if (negative? (car rest)) (return (car rest)) (scan (cdr rest)))))
                 (scan items))))
             (list (first-negative '(1 2 -3 4)) (first-negative '(1 2)))"
        ),
        "(-3 #f)"
    );
}

#[test]
fn continuations_expire_with_their_extent() {
    let mut interp = Interpreter::new();
    eval(&mut interp, "(define saved #f)");
    assert_eq!(
        eval(&mut interp, "(+ 1 (call/cc (lambda (k) (set! saved k) 1)))"),
        "2"
    );
    assert!(matches!(
        interp.eval_str("(saved 5)"),
        Err(Error::ContinuationExpired)
    ));
}

#[test]
fn collector_keeps_reachable_values() {
    let mut interp = Interpreter::new();
    eval(&mut interp, "(define keep (list 1 (vector 2 \"three\")))");
    for _ in 0..3 {
        interp.collect();
    }
    assert_eq!(eval(&mut interp, "keep"), "(1 #(2 \"three\"))");
}

#[test]
fn collector_reclaims_unreachable_values() {
    let mut interp = Interpreter::new();
    let dropped = interp.eval_str("(list 7 8 9)").unwrap();
    let r = dropped.as_object().unwrap();
    assert!(interp.heap.contains(r));
    assert!(interp.collect() > 0);
    assert!(!interp.heap.contains(r));

    eval(&mut interp, "(define cycle (list 1 2)) (set-cdr! (cdr cycle) cycle)");
    let before = interp.heap.len();
    eval(&mut interp, "(set! cycle #f)");
    assert!(interp.heap.len() < before);
}

#[test]
fn gc_primitive_reports_reclaimed_objects() {
    let mut interp = Interpreter::new();
    interp.config.collect_between_forms = false;
    let reclaimed = eval(&mut interp, "(list 1 2 3) (vector 4 5) (gc)");
    assert_ne!(reclaimed, "0");
}

static RELEASED: AtomicUsize = AtomicUsize::new(0);

fn release_counter(_: &mut Heap, _: ObjRef) {
    RELEASED.fetch_add(1, Ordering::SeqCst);
}

static COUNTER: TypeDescriptor = TypeDescriptor {
    finalize: Some(release_counter),
    ..TypeDescriptor::named("counter")
};

#[test]
fn userdata_finalizer_runs_when_reclaimed() {
    let mut interp = Interpreter::new();
    let handle = interp.wrap_userdata(&COUNTER, Box::new(17u32));
    interp.define_global("handle", handle);
    interp.collect();
    assert_eq!(RELEASED.load(Ordering::SeqCst), 0);
    assert_eq!(eval(&mut interp, "handle"), "#[counter]");

    eval(&mut interp, "(set! handle #f)");
    assert_eq!(RELEASED.load(Ordering::SeqCst), 1);
}

#[test]
fn equality_tiers() {
    assert_eq!(eval_fresh("(eq? (list 1) (list 1))"), "#f");
    assert_eq!(eval_fresh("(equal? (list 1) (list 1))"), "#t");
    assert_eq!(eval_fresh("(eqv? 2 2)"), "#t");
    assert_eq!(eval_fresh("(eqv? #\\a #\\a)"), "#t");
    assert_eq!(eval_fresh("(eqv? \"a\" \"a\")"), "#f");
    assert_eq!(eval_fresh("(equal? \"a\" \"a\")"), "#t");
    assert_eq!(
        eval_fresh("(equal? (vector 1 (list 2 \"x\")) (vector 1 (list 2 \"x\")))"),
        "#t"
    );
    assert_eq!(eval_fresh("(equal? (vector 1 2) (list 1 2))"), "#f");
    assert_eq!(eval_fresh("(let ((p (list 1))) (eq? p p))"), "#t");
}

#[test]
fn derived_binding_forms() {
    assert_eq!(eval_fresh("(let ((x 1) (y 2)) (+ x y))"), "3");
    assert_eq!(eval_fresh("(let* ((x 1) (y (+ x 1))) (* x y))"), "2");
    assert_eq!(
        eval_fresh("(let loop ((i 0) (acc 0)) (if (= i 5) acc (loop (+ i 1) (+ acc i))))"),
        "10"
    );
    assert_eq!(
        eval_fresh(
            "(letrec ((even? (lambda (n) (if (= n 0) #t (odd? (- n 1)))))
                      (odd? (lambda (n) (if (= n 0) #f (even? (- n 1))))))
               (even? 100))"
        ),
        "#t"
    );
    assert_eq!(
        eval_fresh("(do ((i 0 (+ i 1)) (acc '() (cons i acc))) ((= i 3) acc))"),
        "(2 1 0)"
    );
}

#[test]
fn derived_conditionals() {
    assert_eq!(eval_fresh("(and 1 2 3)"), "3");
    assert_eq!(eval_fresh("(and 1 #f 3)"), "#f");
    assert_eq!(eval_fresh("(or #f 2 (car '()))"), "2");
    assert_eq!(eval_fresh("(or)"), "#f");
    assert_eq!(
        eval_fresh("(cond ((assv 2 '((1 . a) (2 . b))) => cdr) (else 'none))"),
        "b"
    );
    assert_eq!(eval_fresh("(cond (#f 1) ((+ 1 1)))"), "2");
    assert_eq!(
        eval_fresh("(case 3 ((1 2) 'low) ((3 4) 'mid) (else 'high))"),
        "mid"
    );
    assert_eq!(eval_fresh("(case 9 ((1 2) 'low) (else 'high))"), "high");
    assert_eq!(eval_fresh("(when (> 2 1) 'a 'b)"), "b");
    assert_eq!(eval_fresh("(unless (> 2 1) 'a)"), "#!unspecified");
    assert_eq!(
        eval_fresh(
            "(define area (case-lambda ((r) (* 3 r r)) ((w h) (* w h)) ((a b . more) (length more))))
             (list (area 2) (area 2 5) (area 1 2 3 4))"
        ),
        "(12 10 2)"
    );
}

#[test]
fn assert_reports_the_failing_expression() {
    let mut interp = Interpreter::new();
    assert_eq!(eval(&mut interp, "(assert (= 1 1))"), "#t");
    let err = interp.eval_str("(assert (= 1 2))").unwrap_err();
    assert_eq!(interp.describe(&err), "assertion failed: (= 1 2)");
}

#[test]
fn macros_receive_unevaluated_operands() {
    assert_eq!(
        eval_fresh(
            "(define-macro (swap! a b) `(let ((tmp ,a)) (set! ,a ,b) (set! ,b tmp)))
             (define p 1) (define q 2) (swap! p q) (list p q)"
        ),
        "(2 1)"
    );
    assert_eq!(
        eval_fresh(
            "(define quote-first (macro (lambda (operands) (list 'quote (car operands)))))
             (quote-first (not evaluated))"
        ),
        "(not evaluated)"
    );
    assert_eq!(
        eval_fresh(
            "(define env-of-call (macro (lambda (operands env) (list 'quote env))))
             (eq? (env-of-call) (interaction-environment))"
        ),
        "#t"
    );
    assert_eq!(eval_fresh("(macroexpand '(when a b))"), "(if a (begin b))");
    assert_eq!(eval_fresh("(macro? when)"), "#t");
}

#[test]
fn try_catches_errors_and_raised_objects() {
    assert_eq!(
        eval_fresh("(try (error \"boom:\" 1 'x) (catch e e))"),
        "\"boom: 1 x\""
    );
    assert_eq!(eval_fresh("(try (raise 'oops) (catch e (list 'caught e)))"), "(caught oops)");
    assert_eq!(eval_fresh("(try (car 5) (catch e (string? e)))"), "#t");
    assert_eq!(eval_fresh("(try (+ 1 2) (catch e 'unused))"), "3");
    assert_eq!(
        eval_fresh("(+ 1 (call/cc (lambda (k) (try (k 10) (catch e 0)))))"),
        "11"
    );
}

#[test]
fn errors_describe_their_cause() {
    let mut interp = Interpreter::new();
    let cases = [
        ("(car 1)", "wrong type argument: expected pair, got 1"),
        ("(undefined-procedure)", "unbound variable: undefined-procedure"),
        ("(1 2)", "not applicable: 1"),
        ("(if)", "bad syntax in if: expects a test, a consequent and an optional alternative: (if)"),
        ("(error \"custom\" \"text\" #\\c)", "custom \"text\" #\\c"),
    ];
    for (source, expected) in cases.iter() {
        let err = interp.eval_str(source).unwrap_err();
        assert_eq!(interp.describe(&err), *expected);
    }

    let err = interp.eval_str("((lambda (x y) x) 1)").unwrap_err();
    match err {
        Error::BadArgCount(e) => assert_eq!(e.got, 1),
        other => panic!("expected an argument count error, got {}", other),
    }
    let err = interp
        .eval_str("(define (two a b) a) (two 1 2 3)")
        .unwrap_err();
    assert_eq!(
        interp.describe(&err),
        "When evaluating two expected exactly 2 arguments, but received 3 arguments"
    );
}

#[test]
fn read_errors_surface_as_errors() {
    let mut interp = Interpreter::new();
    assert!(matches!(interp.eval_str("(1 2"), Err(Error::Read(_))));
    assert!(matches!(interp.eval_str(")"), Err(Error::Read(_))));
}

#[test]
fn type_objects_construct_values() {
    assert_eq!(eval_fresh("((type-of (cons 1 2)) 3 4)"), "(3 . 4)");
    assert_eq!(eval_fresh("((type-of \"\") #\\a #\\b)"), "\"ab\"");
    assert_eq!(eval_fresh("((type-of (vector)) 1 2)"), "#(1 2)");
    assert_eq!(eval_fresh("(eq? (type-of 1) (type-of 2.5))"), "#t");
    assert_eq!(eval_fresh("(type-of 'sym)"), "#[type symbol]");
}

#[test]
fn apply_and_eval_run_in_tail_position() {
    assert_eq!(eval_fresh("(apply + 1 2 '(3 4))"), "10");
    assert_eq!(eval_fresh("(eval '(* 6 7))"), "42");
    assert_eq!(
        eval_fresh(
            "(define (spin n) (if (= n 0) 'stopped (apply spin (list (- n 1)))))
             (spin 100000)"
        ),
        "stopped"
    );
}

#[test]
fn non_tail_recursion() {
    assert_eq!(
        eval_fresh("(define (fact n) (if (= n 0) 1 (* n (fact (- n 1))))) (fact 20)"),
        "2432902008176640000"
    );
}

#[test]
fn deep_recursion_is_a_catchable_error() {
    let mut interp = Interpreter::with_config(Config {
        max_depth: 200,
        ..Config::default()
    });
    eval(&mut interp, "(define (f n) (if (= n 0) 0 (+ 1 (f (- n 1)))))");
    match interp.eval_str("(f 10000)") {
        Err(Error::RecursionLimit(200)) => {}
        other => panic!("expected the depth limit, got {:?}", other),
    }
    assert_eq!(
        eval(&mut interp, "(try (f 10000) (catch e e))"),
        "\"recursion depth limit exceeded (max: 200)\""
    );
    assert_eq!(eval(&mut interp, "(f 50)"), "50");
}

#[test]
fn cyclic_lists_are_rejected_not_walked() {
    let mut interp = Interpreter::new();
    eval(&mut interp, "(define c (list 1)) (set-cdr! c c)");
    assert!(matches!(
        interp.eval_str("`(0 ,@c)"),
        Err(Error::WrongType { expected: "list", .. })
    ));
    assert!(matches!(
        interp.eval_str("(apply + c)"),
        Err(Error::WrongType { expected: "list", .. })
    ));
    assert!(matches!(
        interp.eval_str("(define call (list '+ 1)) (set-cdr! (cdr call) (cdr call)) (eval call)"),
        Err(Error::Syntax { form: "application", .. })
    ));
    assert!(matches!(
        interp.eval_str("(let ((ps (list 'a))) (set-cdr! ps ps) (eval (list 'lambda ps 1)))"),
        Err(Error::Syntax { form: "lambda", .. })
    ));
    assert_eq!(eval(&mut interp, "(list? c)"), "#f");
}

#[test]
fn procedures_print_their_names() {
    assert_eq!(eval_fresh("(define (named) 1) named"), "#[compound-procedure named]");
    assert_eq!(eval_fresh("car"), "#[primitive car]");
    assert_eq!(eval_fresh("(lambda () 1)"), "#[compound-procedure]");
}

#[test]
fn interpreters_are_independent() {
    let mut a = Interpreter::new();
    let mut b = Interpreter::new();
    eval(&mut a, "(define only-in-a 1)");
    assert!(a.lookup_global("only-in-a").is_some());
    assert!(b.eval_str("only-in-a").is_err());
    assert!(matches!(b.lookup_global("car"), Some(Value::Object(_))));
}
