
use fixtures::{echo, escaped, foreach, get_builder};
use pretty_assertions::assert_eq;
use twigit::ast::{BinaryOp, Case, ElseIf, Expr, If, Stmt, Switch};
use twigit::{
    Block, ConditionalBlock, ConditionalCase, Construct, OutputMode, TemplateNode,
    TransformOptions, TwigFormatter, TwigitError, VariableIteratorBlock, ViewBuilder,
    ViewBuilderInterface,
};

fn if_else(cond: Expr, body: Vec<Stmt>, else_body: Option<Vec<Stmt>>) -> Stmt {
    Stmt::If(If {
        cond,
        body,
        elseifs: vec![],
        else_body,
    })
}

#[test]
#[ntest::timeout(100)]
fn test_literal_and_variable() {
    let program = vec![echo(Expr::concat(Expr::string("Hello "), Expr::var("name")))];

    let view = get_builder().build_view(&program).unwrap();

    assert_eq!(
        view.template.children,
        vec![
            TemplateNode::html("Hello "),
            TemplateNode::variable("name", None, OutputMode::Raw),
        ]
    );
    assert_eq!(view.code_text(), "$view = ['name' => $name];\n");
}

#[test]
#[ntest::timeout(100)]
fn test_literal_and_variable_without_merging() {
    let program = vec![echo(Expr::concat(Expr::string("Hello "), Expr::var("name")))];

    let builder = ViewBuilder::with_options(TransformOptions::new().with_merge_assignments(false));
    let view = builder.build_view(&program).unwrap();

    assert_eq!(view.code_text(), "$view = [];\n$view['name'] = $name;\n");
}

#[test]
#[ntest::timeout(100)]
fn test_escaped_output_defers_escaping() {
    let program = vec![echo(escaped(Expr::concat(
        Expr::string("Hi "),
        Expr::var("name"),
    )))];

    let view = get_builder().build_view(&program).unwrap();

    assert_eq!(
        view.template.children,
        vec![
            TemplateNode::html("Hi "),
            TemplateNode::variable("name", None, OutputMode::Safe),
        ]
    );
    // The stored value is the unescaped variable.
    assert_eq!(view.code_text(), "$view = ['name' => $name];\n");
}

#[test]
#[ntest::timeout(100)]
fn test_escaped_constants_become_html() {
    let program = vec![echo(escaped(Expr::string("<b>Tom & Jerry</b>")))];

    let view = get_builder().build_view(&program).unwrap();

    assert_eq!(
        view.template.children,
        vec![TemplateNode::html("&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;")]
    );
    assert_eq!(view.code_text(), "$view = [];\n");
}

#[test]
#[ntest::timeout(100)]
fn test_empty_else_branch_is_pruned() {
    let program = vec![if_else(
        Expr::var("flag"),
        vec![echo(Expr::string("yes"))],
        Some(vec![]),
    )];

    let view = get_builder().build_view(&program).unwrap();

    assert_eq!(
        view.template.children,
        vec![TemplateNode::Conditional(ConditionalBlock {
            scope: None,
            cases: vec![ConditionalCase {
                flag: "flag".to_string(),
                block: Block {
                    children: vec![TemplateNode::html("yes")],
                },
            }],
            else_case: None,
        })]
    );
    assert_eq!(
        view.code_text(),
        "$view = [];\nif ($flag) {\n    $view['flag'] = true;\n}\n"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_loop_values_are_collected_per_iteration() {
    let program = vec![foreach(
        Expr::var("items"),
        "item",
        vec![echo(Expr::property(Expr::var("item"), "label"))],
    )];

    let view = get_builder().build_view(&program).unwrap();

    let mut iterator = VariableIteratorBlock::new("items", "item", None);
    iterator
        .body
        .push(TemplateNode::variable("label", Some("item"), OutputMode::Raw));
    assert_eq!(view.template.children, vec![TemplateNode::Iterator(iterator)]);
    assert_eq!(
        view.code_text(),
        "$view = ['items' => []];\n\
         foreach ($items as $item) {\n    \
         $view['items'][] = ['label' => $item->label];\n\
         }\n"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_page_with_loop_and_condition() {
    let program = vec![
        Stmt::html("<h1>"),
        echo(escaped(Expr::var("title"))),
        Stmt::html("</h1><ul>"),
        foreach(
            Expr::var("posts"),
            "post",
            vec![
                Stmt::echo(vec![
                    Expr::string("<li>"),
                    escaped(Expr::property(Expr::var("post"), "title")),
                ]),
                if_else(
                    Expr::property(Expr::var("post"), "featured"),
                    vec![echo(Expr::string(" *"))],
                    None,
                ),
                echo(Expr::string("</li>")),
            ],
        ),
        echo(Expr::string("</ul>")),
    ];

    let view = get_builder().build_view(&program).unwrap();

    assert_eq!(
        view.render_template(&TwigFormatter),
        "<h1>{{ title }}</h1><ul>{% for post in posts %}\n\
         <li>{{ post.title }}{% if post.post_featured %}\n *{% endif %}\n\
         </li>{% endfor %}\n</ul>"
    );
    assert_eq!(
        view.code_text(),
        "$view = ['title' => $title, 'posts' => []];\n\
         foreach ($posts as $post) {\n    \
         $view_post = ['title' => $post->title];\n    \
         if ($post->featured) {\n        \
         $view_post['post_featured'] = true;\n    \
         }\n    \
         $view['posts'][] = $view_post;\n\
         }\n"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_names_are_unique_within_a_frame() {
    let program = vec![Stmt::echo(vec![
        Expr::var("title"),
        Expr::string(" - "),
        Expr::var("title"),
    ])];

    let view = get_builder().build_view(&program).unwrap();

    let names: Vec<_> = view
        .template
        .variables()
        .iter()
        .map(|v| v.name.as_str())
        .collect();
    assert_eq!(names, vec!["title", "title_2"]);
    assert_eq!(
        view.code_text(),
        "$view = ['title' => $title, 'title_2' => $title];\n"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_branches_reuse_names_but_later_values_do_not() {
    let program = vec![
        if_else(
            Expr::var("a"),
            vec![echo(Expr::var("name"))],
            Some(vec![echo(Expr::var("name"))]),
        ),
        echo(Expr::var("name")),
    ];

    let view = get_builder().build_view(&program).unwrap();

    let names: Vec<_> = view
        .template
        .variables()
        .iter()
        .map(|v| v.name.as_str())
        .collect();
    assert_eq!(names, vec!["name", "name", "name_2"]);
}

#[test]
#[ntest::timeout(100)]
fn test_transform_is_deterministic() {
    let program = vec![
        echo(escaped(Expr::var("heading"))),
        foreach(
            Expr::call("array_reverse", vec![Expr::var("scripts")]),
            "script",
            vec![if_else(
                Expr::binary(
                    BinaryOp::Identical,
                    Expr::property(Expr::var("script"), "kind"),
                    Expr::string("inline"),
                ),
                vec![echo(Expr::property(Expr::var("script"), "body"))],
                Some(vec![echo(Expr::property(Expr::var("script"), "src"))]),
            )],
        ),
    ];

    let first = get_builder().build_view(&program).unwrap();
    let second = get_builder().build_view(&program).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first.render_template(&TwigFormatter),
        second.render_template(&TwigFormatter)
    );
    assert!(
        first
            .render_template(&TwigFormatter)
            .contains("{% for script in reverse_scripts %}")
    );
}

#[test]
#[ntest::timeout(100)]
fn test_unescaped_values_are_never_safe() {
    let program = vec![Stmt::echo(vec![
        Expr::var("raw"),
        escaped(Expr::var("clean")),
        Expr::call("count", vec![Expr::var("xs")]),
        Expr::ternary(Expr::var("c"), Expr::var("y"), escaped(Expr::var("z"))),
    ])];

    let view = get_builder().build_view(&program).unwrap();

    let modes: Vec<_> = view
        .template
        .variables()
        .iter()
        .map(|v| (v.name.as_str(), v.mode))
        .collect();
    assert_eq!(
        modes,
        vec![
            ("raw", OutputMode::Raw),
            ("clean", OutputMode::Safe),
            ("count_xs", OutputMode::Safe),
            ("c_y_htmlspecialchars_z", OutputMode::Raw),
        ]
    );
}

#[test]
#[ntest::timeout(100)]
fn test_pruned_branch_keeps_its_statements() {
    let program = vec![Stmt::If(If {
        cond: Expr::var("admin"),
        body: vec![Stmt::assign(
            Expr::var("count"),
            Expr::binary(BinaryOp::Add, Expr::var("count"), Expr::Int(1)),
        )],
        elseifs: vec![ElseIf {
            cond: Expr::var("guest"),
            body: vec![echo(Expr::string("Welcome"))],
        }],
        else_body: Some(vec![echo(Expr::string("Hello"))]),
    })];

    let view = get_builder().build_view(&program).unwrap();

    assert_eq!(
        view.render_template(&TwigFormatter),
        "{% if guest %}\nWelcome{% elseif otherwise %}\nHello{% endif %}\n"
    );
    assert_eq!(
        view.code_text(),
        "$view = [];\n\
         if ($admin) {\n    \
         $count = $count + 1;\n\
         } elseif ($guest) {\n    \
         $view['guest'] = true;\n\
         } else {\n    \
         $view['otherwise'] = true;\n\
         }\n"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_conditional_without_output_is_dropped() {
    let program = vec![if_else(
        Expr::var("debug"),
        vec![Stmt::assign(Expr::var("level"), Expr::Int(2))],
        None,
    )];

    let view = get_builder().build_view(&program).unwrap();

    assert!(view.template.is_empty());
    assert_eq!(
        view.code_text(),
        "$view = [];\nif ($debug) {\n    $level = 2;\n}\n"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_loop_without_output_is_kept() {
    let program = vec![
        foreach(
            Expr::var("rows"),
            "row",
            vec![Stmt::assign(
                Expr::var("total"),
                Expr::binary(BinaryOp::Add, Expr::var("total"), Expr::var("row")),
            )],
        ),
        echo(Expr::var("total")),
    ];

    let view = get_builder().build_view(&program).unwrap();

    assert_eq!(
        view.template.children,
        vec![TemplateNode::variable("total", None, OutputMode::Raw)]
    );
    assert_eq!(
        view.code_text(),
        "$view = ['rows' => []];\n\
         foreach ($rows as $row) {\n    \
         $total = $total + $row;\n\
         }\n\
         $view['total'] = $total;\n"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_loop_with_markup_only_appends_empty_entries() {
    let program = vec![foreach(
        Expr::var("stars"),
        "star",
        vec![echo(Expr::string("*"))],
    )];

    let view = get_builder().build_view(&program).unwrap();

    assert_eq!(
        view.code_text(),
        "$view = ['stars' => []];\n\
         foreach ($stars as $star) {\n    \
         $view['stars'][] = [];\n\
         }\n"
    );
    assert_eq!(
        view.render_template(&TwigFormatter),
        "{% for star in stars %}\n*{% endfor %}\n"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_switch_cases_become_flags() {
    let program = vec![Stmt::Switch(Switch {
        subject: Expr::var("kind"),
        cases: vec![
            Case {
                test: Some(Expr::string("news")),
                body: vec![echo(Expr::string("News")), Stmt::Break],
            },
            Case {
                test: Some(Expr::string("blog")),
                body: vec![Stmt::assign(Expr::var("n"), Expr::Int(1)), Stmt::Break],
            },
            Case {
                test: None,
                body: vec![echo(Expr::string("Other"))],
            },
        ],
    })];

    let view = get_builder().build_view(&program).unwrap();

    assert_eq!(
        view.render_template(&TwigFormatter),
        "{% if kind_eq_news %}\nNews{% elseif otherwise %}\nOther{% endif %}\n"
    );
    assert_eq!(
        view.code_text(),
        "$view = [];\n\
         switch ($kind) {\n    \
         case 'news':\n        \
         $view['kind_eq_news'] = true;\n        \
         break;\n    \
         case 'blog':\n        \
         $n = 1;\n        \
         break;\n    \
         default:\n        \
         $view['otherwise'] = true;\n\
         }\n"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_statement_print_is_output() {
    let program = vec![Stmt::Expr(Expr::Print(Box::new(Expr::var("message"))))];

    let view = get_builder().build_view(&program).unwrap();

    assert_eq!(
        view.template.children,
        vec![TemplateNode::variable("message", None, OutputMode::Raw)]
    );
}

#[test]
#[ntest::timeout(100)]
fn test_rejects_output_buffering() {
    let builder = get_builder();
    let program = vec![
        Stmt::Expr(Expr::call("ob_start", vec![])),
        echo(Expr::string("captured")),
    ];

    let err = builder.build_view(&program).unwrap_err();
    assert_eq!(
        err,
        TwigitError::UnsupportedConstruct {
            construct: Construct::OutputBuffering {
                function: "ob_start".to_string(),
            },
        }
    );

    // A failed call leaves nothing behind for the next one.
    let clean = vec![echo(Expr::var("name"))];
    assert_eq!(
        builder.build_view(&clean).unwrap(),
        ViewBuilder::new().build_view(&clean).unwrap()
    );
}

#[test]
#[ntest::timeout(100)]
fn test_rejects_nested_output_buffering() {
    let program = vec![foreach(
        Expr::var("xs"),
        "x",
        vec![if_else(
            Expr::var("x"),
            vec![echo(Expr::call("ob_get_clean", vec![]))],
            None,
        )],
    )];

    assert!(matches!(
        get_builder().build_view(&program),
        Err(TwigitError::UnsupportedConstruct {
            construct: Construct::OutputBuffering { .. }
        })
    ));
}

#[test]
#[ntest::timeout(100)]
fn test_rejects_switch_fallthrough() {
    let program = vec![Stmt::Switch(Switch {
        subject: Expr::var("x"),
        cases: vec![
            Case {
                test: Some(Expr::Int(1)),
                body: vec![echo(Expr::string("a"))],
            },
            Case {
                test: Some(Expr::Int(2)),
                body: vec![echo(Expr::string("b")), Stmt::Break],
            },
        ],
    })];

    assert_eq!(
        get_builder().build_view(&program),
        Err(TwigitError::UnsupportedConstruct {
            construct: Construct::SwitchFallthrough { case_index: 0 },
        })
    );
}

#[test]
#[ntest::timeout(100)]
fn test_rejects_print_as_value() {
    let program = vec![echo(Expr::concat(
        Expr::string("a"),
        Expr::Print(Box::new(Expr::string("b"))),
    ))];

    assert_eq!(
        get_builder().build_view(&program),
        Err(TwigitError::UnsupportedConstruct {
            construct: Construct::PrintAsValue,
        })
    );
}

#[test]
#[ntest::timeout(100)]
fn test_rejects_break_out_of_output_loop() {
    let stop = if_else(
        Expr::binary(BinaryOp::Eq, Expr::var("x"), Expr::Int(3)),
        vec![Stmt::Break],
        None,
    );

    let printing = vec![foreach(
        Expr::var("xs"),
        "x",
        vec![stop.clone(), echo(Expr::var("x"))],
    )];
    assert_eq!(
        get_builder().build_view(&printing),
        Err(TwigitError::UnsupportedConstruct {
            construct: Construct::EarlyLoopExit,
        })
    );

    let silent = vec![foreach(
        Expr::var("xs"),
        "x",
        vec![stop, Stmt::assign(Expr::var("last"), Expr::var("x"))],
    )];
    assert!(get_builder().build_view(&silent).is_ok());
}

fn guarded_switch(a_body: Vec<Stmt>, default_body: Vec<Stmt>) -> Vec<Stmt> {
    vec![Stmt::Switch(Switch {
        subject: Expr::var("kind"),
        cases: vec![
            Case {
                test: Some(Expr::string("a")),
                body: a_body,
            },
            Case {
                test: None,
                body: default_body,
            },
        ],
    })]
}

#[test]
#[ntest::timeout(100)]
fn test_rejects_break_out_of_output_switch_case() {
    let skip = if_else(Expr::var("skip"), vec![Stmt::Break], None);

    let printing = guarded_switch(
        vec![skip.clone(), echo(Expr::string("A-body")), Stmt::Break],
        vec![echo(Expr::string("other"))],
    );
    assert_eq!(
        get_builder().build_view(&printing),
        Err(TwigitError::UnsupportedConstruct {
            construct: Construct::EarlySwitchExit { case_index: 0 },
        })
    );

    let printing_default = guarded_switch(
        vec![echo(Expr::string("A-body")), Stmt::Break],
        vec![skip.clone(), echo(Expr::string("other"))],
    );
    assert_eq!(
        get_builder().build_view(&printing_default),
        Err(TwigitError::UnsupportedConstruct {
            construct: Construct::EarlySwitchExit { case_index: 1 },
        })
    );

    // A case without output is pruned, so leaving it early is harmless.
    let silent = guarded_switch(
        vec![
            skip,
            Stmt::assign(Expr::var("seen"), Expr::Bool(true)),
            Stmt::Break,
        ],
        vec![echo(Expr::string("other"))],
    );
    assert!(get_builder().build_view(&silent).is_ok());

    // A break closing an inner loop stays inside the case.
    let inner_loop = guarded_switch(
        vec![
            foreach(
                Expr::var("xs"),
                "x",
                vec![Stmt::Break],
            ),
            echo(Expr::string("A-body")),
            Stmt::Break,
        ],
        vec![],
    );
    assert!(get_builder().build_view(&inner_loop).is_ok());
}

#[test]
#[ntest::timeout(100)]
fn test_options() {
    let builder = ViewBuilder::with_options(
        TransformOptions::new()
            .with_root_variable("data")
            .with_escape_function("e")
            .with_safe_function("number_format")
            .with_max_condition_length(10),
    );
    let program = vec![
        echo(Expr::call("e", vec![Expr::var("name")])),
        echo(Expr::call("number_format", vec![Expr::var("price")])),
        if_else(
            Expr::binary(BinaryOp::And, Expr::var("alpha_beta"), Expr::var("gamma")),
            vec![echo(Expr::string("!"))],
            None,
        ),
    ];

    assert_eq!(builder.options().root_variable, "data");
    assert_eq!(builder.options().max_condition_length, 10);

    let view = builder.build_view(&program).unwrap();

    assert_eq!(view.data_variable_name, "data");
    assert_eq!(
        view.render_template(&TwigFormatter),
        "{{ name }}{{ number_format_price }}{% if alpha_beta_etc %}\n!{% endif %}\n"
    );
    assert_eq!(
        view.code_text(),
        "$data = ['name' => $name, 'number_format_price' => number_format($price)];\n\
         if ($alpha_beta && $gamma) {\n    \
         $data['alpha_beta_etc'] = true;\n\
         }\n"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_nested_loops_use_fresh_data_variables() {
    let program = vec![foreach(
        Expr::var("posts"),
        "post",
        vec![foreach(
            Expr::property(Expr::var("post"), "tags"),
            "tag",
            vec![echo(escaped(Expr::var("tag")))],
        )],
    )];

    let view = get_builder().build_view(&program).unwrap();

    assert_eq!(
        view.render_template(&TwigFormatter),
        "{% for post in posts %}\n{% for tag in post.tags %}\n{{ tag.tag }}{% endfor %}\n{% endfor %}\n"
    );
    assert_eq!(
        view.code_text(),
        "$view = ['posts' => []];\n\
         foreach ($posts as $post) {\n    \
         $view_post = ['tags' => []];\n    \
         foreach ($post->tags as $tag) {\n        \
         $view_post['tags'][] = ['tag' => $tag];\n    \
         }\n    \
         $view['posts'][] = $view_post;\n\
         }\n"
    );
}
